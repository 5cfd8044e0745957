// Copyright (c) 2022 Huawei Technologies Co.,Ltd. All rights reserved.
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

use anyhow::{Context, Result};
use log::{debug, info};

use crate::block::CDROM_SECTOR_SIZE;
use crate::scsi::cmd::{cdb_get_inquiry, cdb_read_capacity};
use crate::scsi::dispatch::CdbDispatcher;
use crate::scsi::ready::scsi_is_ready;
use crate::Drive;
use util::clock::TimeSource;

/// SCSI DEVICE TYPES.
pub const SCSI_TYPE_DISK: u8 = 0x00;
pub const SCSI_TYPE_ROM: u8 = 0x05;

/// Boot menu descriptions are limited to this many bytes, terminator included.
pub const MAXDESCSIZE: usize = 80;

/// What drive initialization learned about a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScsiDriveInfo {
    /// Peripheral device type, forced to CD-ROM for 2048 byte blocks.
    pub pdt: u8,
    /// Boot menu description.
    pub desc: String,
    /// False when the drive never became ready; geometry is then unknown.
    pub ready: bool,
}

impl ScsiDriveInfo {
    pub fn is_cdrom(&self) -> bool {
        self.pdt == SCSI_TYPE_ROM
    }
}

fn drive_desc(label: &str, pdt: u8, vendor: &str, product: &str, rev: &str) -> String {
    let mut desc = if pdt == SCSI_TYPE_ROM {
        format!("DVD/CD [{} Drive {} {} {}]", label, vendor, product, rev)
    } else {
        format!("{} Drive {} {} {}", label, vendor, product, rev)
    };
    // Identification strings are ASCII only, so byte truncation is safe.
    desc.truncate(MAXDESCSIZE - 1);
    desc
}

/// Identify a drive and read its geometry.
///
/// INQUIRY and READ CAPACITY failures are returned as errors. A drive that
/// never becomes ready is not an error: its identity is returned with
/// `ready` cleared and the block size left at zero.
///
/// # Arguments
///
/// * `dispatch` - Routes the commands to the drive's transport.
/// * `clock` - Time source for the readiness deadline.
/// * `drive` - Receives the removable flag, block size and sector count.
/// * `label` - Transport name used in the description, e.g. "virtio-scsi".
pub fn scsi_init_drive(
    dispatch: &CdbDispatcher,
    clock: &dyn TimeSource,
    drive: &mut Drive,
    label: &str,
) -> Result<ScsiDriveInfo> {
    let inquiry = cdb_get_inquiry(dispatch, drive)
        .with_context(|| format!("{}: INQUIRY failed", label))?;
    let mut pdt = inquiry.pdt;
    drive.removable = inquiry.removable;
    debug!(
        "{} vendor='{}' product='{}' rev='{}' type={} removable={}",
        label, inquiry.vendor, inquiry.product, inquiry.rev, pdt, drive.removable
    );

    if let Err(e) = scsi_is_ready(dispatch, drive, clock) {
        info!("{}: drive not ready: {}", label, e);
        return Ok(ScsiDriveInfo {
            pdt,
            desc: drive_desc(label, pdt, &inquiry.vendor, &inquiry.product, &inquiry.rev),
            ready: false,
        });
    }

    let capacity = cdb_read_capacity(dispatch, drive)
        .with_context(|| format!("{}: READ CAPACITY failed", label))?;
    debug!(
        "{} blksize={} sectors={}",
        label,
        capacity.blksize,
        capacity.sectors()
    );
    drive.blksize = capacity.blksize;
    drive.sectors = capacity.sectors();

    // Optical media report 2048 byte blocks whatever type they claim.
    if capacity.blksize == CDROM_SECTOR_SIZE {
        pdt = SCSI_TYPE_ROM;
    }

    Ok(ScsiDriveInfo {
        pdt,
        desc: drive_desc(label, pdt, &inquiry.vendor, &inquiry.product, &inquiry.rev),
        ready: true,
    })
}
