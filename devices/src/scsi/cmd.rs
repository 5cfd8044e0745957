// Copyright (c) 2024 Huawei Technologies Co.,Ltd. All rights reserved.
//
// StratoVirt is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Request helpers issuing one command block each through the dispatcher.
//!
//! Identification commands transfer a single block the size of their
//! response; data commands use the drive's block size.

use anyhow::{anyhow, Result};

use crate::scsi::dispatch::CdbDispatcher;
use crate::ScsiCdb::{
    CommandBlock, InquiryData, ModeSenseGeometry, ReadCapacityData, SenseData, INQUIRY_DATA_LEN,
    MODE_SENSE_GEOM_LEN, READ_CAPACITY_DATA_LEN, SENSE_DATA_LEN,
};
use crate::{DiskError, DiskOp, Drive};

fn cdb_get_block(
    dispatch: &CdbDispatcher,
    drive: &Drive,
    cdb: &CommandBlock,
    data: &mut [u8],
) -> Result<()> {
    let blocksize = data.len() as u16;
    let mut op = DiskOp::new(drive, 0, 1, data);
    dispatch.cdb_cmd_data(&mut op, cdb, blocksize)
}

pub fn cdb_get_inquiry(dispatch: &CdbDispatcher, drive: &Drive) -> Result<InquiryData> {
    let mut data = [0_u8; INQUIRY_DATA_LEN];
    let cdb = CommandBlock::inquiry(INQUIRY_DATA_LEN as u8);
    cdb_get_block(dispatch, drive, &cdb, &mut data)?;
    InquiryData::from_bytes(&data)
}

pub fn cdb_get_sense(dispatch: &CdbDispatcher, drive: &Drive) -> Result<SenseData> {
    let mut data = [0_u8; SENSE_DATA_LEN];
    let cdb = CommandBlock::request_sense(SENSE_DATA_LEN as u8);
    cdb_get_block(dispatch, drive, &cdb, &mut data)?;
    SenseData::from_bytes(&data)
}

pub fn cdb_test_unit_ready(dispatch: &CdbDispatcher, drive: &Drive) -> Result<()> {
    let mut empty = [0_u8; 0];
    let mut op = DiskOp::new(drive, 0, 0, &mut empty);
    dispatch.cdb_cmd_data(&mut op, &CommandBlock::test_unit_ready(), 0)
}

pub fn cdb_read_capacity(dispatch: &CdbDispatcher, drive: &Drive) -> Result<ReadCapacityData> {
    let mut data = [0_u8; READ_CAPACITY_DATA_LEN];
    cdb_get_block(dispatch, drive, &CommandBlock::read_capacity(), &mut data)?;
    ReadCapacityData::from_bytes(&data)
}

pub fn cdb_mode_sense_geom(dispatch: &CdbDispatcher, drive: &Drive) -> Result<ModeSenseGeometry> {
    let mut data = [0_u8; MODE_SENSE_GEOM_LEN];
    let cdb = CommandBlock::mode_sense_geometry(MODE_SENSE_GEOM_LEN as u16);
    cdb_get_block(dispatch, drive, &cdb, &mut data)?;
    ModeSenseGeometry::from_bytes(&data)
}

fn rw_params(op: &DiskOp) -> Result<(u32, u16)> {
    let lba = u32::try_from(op.lba).map_err(|_| {
        anyhow!(DiskError::Parameter(format!(
            "lba {} beyond 10 byte command range",
            op.lba
        )))
    })?;
    let blocksize = u16::try_from(op.drive.blksize).map_err(|_| {
        anyhow!(DiskError::Parameter(format!(
            "block size {} not transferable",
            op.drive.blksize
        )))
    })?;
    Ok((lba, blocksize))
}

/// Read `op.count` blocks starting at `op.lba` into `op.buf`.
pub fn cdb_read(dispatch: &CdbDispatcher, op: &mut DiskOp) -> Result<()> {
    let (lba, blocksize) = rw_params(op)?;
    let cdb = CommandBlock::read_10(lba, op.count);
    dispatch.cdb_cmd_data(op, &cdb, blocksize)
}

/// Write `op.count` blocks from `op.buf` starting at `op.lba`.
pub fn cdb_write(dispatch: &CdbDispatcher, op: &mut DiskOp) -> Result<()> {
    let (lba, blocksize) = rw_params(op)?;
    let cdb = CommandBlock::write_10(lba, op.count);
    dispatch.cdb_cmd_data(op, &cdb, blocksize)
}
