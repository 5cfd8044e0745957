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

use std::fmt;

use anyhow::{anyhow, Result};
use byteorder::{BigEndian, ByteOrder};

use crate::DiskError;
use util::num_ops::trim_padded;

/// Scsi Operation code.
pub const TEST_UNIT_READY: u8 = 0x00;
pub const REQUEST_SENSE: u8 = 0x03;
pub const INQUIRY: u8 = 0x12;
pub const READ_CAPACITY_10: u8 = 0x25;
pub const READ_10: u8 = 0x28;
pub const WRITE_10: u8 = 0x2a;
pub const VERIFY_10: u8 = 0x2f;
pub const MODE_SENSE_10: u8 = 0x5a;

/// SAM Status codes.
pub const GOOD: u8 = 0x00;
pub const CHECK_CONDITION: u8 = 0x02;

/// Command blocks always occupy 16 bytes; shorter commands are zero padded.
pub const SCSI_CMD_BUF_SIZE: usize = 16;

/// Sense Keys.
pub const NOT_READY: u8 = 0x02;

macro_rules! scsisense {
    ( $key:expr, $asc: expr, $ascq:expr) => {
        ScsiSense {
            key: $key,
            asc: $asc,
            ascq: $ascq,
        }
    };
}

/// Sense Code.
pub const SCSI_SENSE_BECOMING_READY: ScsiSense = scsisense!(NOT_READY, 0x04, 0x01);
pub const SCSI_SENSE_NO_MEDIUM: ScsiSense = scsisense!(NOT_READY, 0x3a, 0x00);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScsiSense {
    /// Sense key.
    pub key: u8,
    /// Additional sense code.
    pub asc: u8,
    /// Additional sense code qualifier.
    pub ascq: u8,
}

/// Mode page codes for mode sense.
pub const MODE_PAGE_HD_GEOMETRY: u8 = 0x04;

/// Mode sense flag: do not return block descriptors.
const MODE_SENSE_DBD: u8 = 0x08;

pub const INQUIRY_DATA_LEN: usize = 36;
pub const SENSE_DATA_LEN: usize = 18;
pub const READ_CAPACITY_DATA_LEN: usize = 8;
pub const MODE_SENSE_GEOM_LEN: usize = 27;

pub const SCSI_INQUIRY_VENDOR_MAX_LEN: usize = 8;
pub const SCSI_INQUIRY_PRODUCT_MAX_LEN: usize = 16;
pub const SCSI_INQUIRY_VERSION_MAX_LEN: usize = 4;

/// A SCSI command descriptor block.
///
/// Built only through the constructors below, so every instance is a well
/// formed command of the supported vocabulary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandBlock {
    buf: [u8; SCSI_CMD_BUF_SIZE],
}

impl CommandBlock {
    fn with_opcode(op: u8) -> Self {
        let mut buf = [0_u8; SCSI_CMD_BUF_SIZE];
        buf[0] = op;
        CommandBlock { buf }
    }

    // Byte[4]: allocation length.
    fn with_alloc_len(op: u8, len: u8) -> Self {
        let mut cdb = Self::with_opcode(op);
        cdb.buf[4] = len;
        cdb
    }

    // Bytes[2-5]: logical block address. Bytes[7-8]: transfer length.
    fn rw_10(op: u8, lba: u32, count: u16) -> Self {
        let mut cdb = Self::with_opcode(op);
        BigEndian::write_u32(&mut cdb.buf[2..6], lba);
        BigEndian::write_u16(&mut cdb.buf[7..9], count);
        cdb
    }

    pub fn test_unit_ready() -> Self {
        Self::with_opcode(TEST_UNIT_READY)
    }

    pub fn request_sense(len: u8) -> Self {
        Self::with_alloc_len(REQUEST_SENSE, len)
    }

    pub fn inquiry(len: u8) -> Self {
        Self::with_alloc_len(INQUIRY, len)
    }

    pub fn read_capacity() -> Self {
        Self::with_opcode(READ_CAPACITY_10)
    }

    pub fn read_10(lba: u32, count: u16) -> Self {
        Self::rw_10(READ_10, lba, count)
    }

    pub fn write_10(lba: u32, count: u16) -> Self {
        Self::rw_10(WRITE_10, lba, count)
    }

    pub fn verify_10(lba: u32, count: u16) -> Self {
        Self::rw_10(VERIFY_10, lba, count)
    }

    /// MODE SENSE(10) for the rigid disk geometry page, without block descriptors.
    pub fn mode_sense_geometry(len: u16) -> Self {
        let mut cdb = Self::with_opcode(MODE_SENSE_10);
        cdb.buf[1] = MODE_SENSE_DBD;
        cdb.buf[2] = MODE_PAGE_HD_GEOMETRY;
        BigEndian::write_u16(&mut cdb.buf[7..9], len);
        cdb
    }

    /// Wrap raw command bytes received from the wire.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < SCSI_CMD_BUF_SIZE {
            return None;
        }
        let mut buf = [0_u8; SCSI_CMD_BUF_SIZE];
        buf.copy_from_slice(&data[..SCSI_CMD_BUF_SIZE]);
        Some(CommandBlock { buf })
    }

    pub fn opcode(&self) -> u8 {
        self.buf[0]
    }

    pub fn as_bytes(&self) -> &[u8; SCSI_CMD_BUF_SIZE] {
        &self.buf
    }

    /// Protocol length of the command, derived from its group code.
    pub fn cdb_len(&self) -> usize {
        match self.buf[0] >> 5 {
            // CDB[0]: Operation Code Byte. Bits[0-4]: Command Code. Bits[5-7]: Group Code.
            // Group Code |  Meaning            |
            // 000b       |  6 bytes commands.  |
            // 001b       |  10 bytes commands. |
            // 010b       |  10 bytes commands. |
            // 100b       |  16 bytes commands. |
            // 101b       |  12 bytes commands. |
            0 => 6,
            1 | 2 => 10,
            4 => 16,
            5 => 12,
            _ => SCSI_CMD_BUF_SIZE,
        }
    }

    /// True when data flows from the host to the device.
    pub fn is_write(&self) -> bool {
        self.buf[0] == WRITE_10
    }

    /// Logical block address of a 10 byte command.
    pub fn lba(&self) -> u32 {
        BigEndian::read_u32(&self.buf[2..6])
    }

    /// Transfer length of a 10 byte command, or allocation length of a 6 byte one.
    pub fn xfer_len(&self) -> u16 {
        match self.buf[0] >> 5 {
            0 => u16::from(self.buf[4]),
            _ => BigEndian::read_u16(&self.buf[7..9]),
        }
    }
}

impl fmt::Debug for CommandBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandBlock({:02x?})", &self.buf[..self.cdb_len()])
    }
}

fn check_len(data: &[u8], need: usize, what: &'static str) -> Result<()> {
    if data.len() < need {
        return Err(anyhow!(DiskError::ShortResponse {
            what,
            len: data.len()
        }));
    }
    Ok(())
}

/// Standard INQUIRY data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InquiryData {
    /// Peripheral device type.
    pub pdt: u8,
    pub removable: bool,
    pub vendor: String,
    pub product: String,
    pub rev: String,
}

impl InquiryData {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_len(data, INQUIRY_DATA_LEN, "INQUIRY")?;
        // Byte0: bits[0-4] peripheral device type. Byte1: bit7 RMB.
        // Bytes[8-15]: vendor. Bytes[16-31]: product. Bytes[32-35]: revision.
        Ok(InquiryData {
            pdt: data[0] & 0x1f,
            removable: data[1] & 0x80 != 0,
            vendor: trim_padded(&data[8..8 + SCSI_INQUIRY_VENDOR_MAX_LEN]),
            product: trim_padded(&data[16..16 + SCSI_INQUIRY_PRODUCT_MAX_LEN]),
            rev: trim_padded(&data[32..32 + SCSI_INQUIRY_VERSION_MAX_LEN]),
        })
    }
}

/// Fixed format sense data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SenseData {
    pub errcode: u8,
    pub segment: u8,
    pub flags: u8,
    pub info: u32,
    pub additional: u8,
    pub specific: u32,
    pub asc: u8,
    pub ascq: u8,
}

impl SenseData {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_len(data, SENSE_DATA_LEN, "REQUEST SENSE")?;
        Ok(SenseData {
            errcode: data[0],
            segment: data[1],
            flags: data[2],
            info: BigEndian::read_u32(&data[3..7]),
            additional: data[7],
            specific: BigEndian::read_u32(&data[8..12]),
            asc: data[12],
            ascq: data[13],
        })
    }

    pub fn key(&self) -> u8 {
        self.flags & 0x0f
    }

    /// Compare the additional sense code, and the qualifier if `with_ascq`.
    pub fn is(&self, sense: &ScsiSense, with_ascq: bool) -> bool {
        self.asc == sense.asc && (!with_ascq || self.ascq == sense.ascq)
    }
}

/// READ CAPACITY(10) data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadCapacityData {
    /// Address of the last logical block.
    pub last_lba: u32,
    pub blksize: u32,
}

impl ReadCapacityData {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_len(data, READ_CAPACITY_DATA_LEN, "READ CAPACITY")?;
        Ok(ReadCapacityData {
            last_lba: BigEndian::read_u32(&data[0..4]),
            blksize: BigEndian::read_u32(&data[4..8]),
        })
    }

    /// Number of addressable blocks.
    pub fn sectors(&self) -> u64 {
        u64::from(self.last_lba) + 1
    }
}

/// Rigid disk geometry page returned by MODE SENSE(10).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeSenseGeometry {
    pub read_only: bool,
    pub page: u8,
    pub cylinders: u32,
    pub heads: u8,
    pub rpm: u16,
}

impl ModeSenseGeometry {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_len(data, MODE_SENSE_GEOM_LEN, "MODE SENSE")?;
        // Bytes[0-7]: mode parameter header, byte3 bit7 is WP.
        // Byte8: page code. Byte9: page length. Bytes[10-12]: cylinders.
        // Byte13: heads. Bytes[25-26]: medium rotation rate.
        Ok(ModeSenseGeometry {
            read_only: data[3] & 0x80 != 0,
            page: data[8] & 0x3f,
            cylinders: BigEndian::read_u24(&data[10..13]),
            heads: data[13],
            rpm: BigEndian::read_u16(&data[25..27]),
        })
    }
}
