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

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use strum_macros::Display;

/// Hard disks are addressed in 512 byte sectors.
pub const DISK_SECTOR_SIZE: u32 = 512;
/// Optical media use 2048 byte sectors.
pub const CDROM_SECTOR_SIZE: u32 = 2048;

/// Transport a drive is reached through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum DriveType {
    #[strum(serialize = "floppy")]
    Floppy,
    #[strum(serialize = "ata")]
    Ata,
    #[strum(serialize = "atapi")]
    Atapi,
    #[strum(serialize = "ramdisk")]
    Ramdisk,
    #[strum(serialize = "cdemu")]
    Cdemu,
    #[strum(serialize = "usb-msc")]
    Usb,
    #[strum(serialize = "virtio-blk")]
    VirtioBlk,
    #[strum(serialize = "ahci")]
    Ahci,
    #[strum(serialize = "virtio-scsi")]
    VirtioScsi,
}

impl DriveType {
    /// Whether drives of this type speak SCSI command blocks.
    pub fn is_cdb_capable(self) -> bool {
        matches!(
            self,
            DriveType::Atapi | DriveType::Usb | DriveType::Ahci | DriveType::VirtioScsi
        )
    }
}

/// Disk service return codes reported to boot loaders.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskRet {
    Success = 0x00,
    EParam = 0x01,
    EAddrNotFound = 0x02,
    EWriteProtect = 0x03,
    EChanged = 0x06,
    EBoundary = 0x09,
    EBadTrack = 0x0c,
    EController = 0x20,
    ETimeout = 0x80,
    ENotReady = 0xaa,
    EMedia = 0xc0,
}

/// A storage device known to the firmware.
///
/// Identity and geometry are filled in by the drive init sequencer and stay
/// fixed afterwards; `ctx` carries the transport's private per-drive state.
pub struct Drive {
    pub drive_type: DriveType,
    /// Transport specific controller id, used in logs.
    pub cntl_id: u32,
    pub removable: bool,
    /// Block size in bytes, 0 until the capacity is known.
    pub blksize: u32,
    pub sectors: u64,
    ctx: Option<Rc<dyn Any>>,
}

impl Drive {
    pub fn new(drive_type: DriveType, cntl_id: u32) -> Self {
        Drive {
            drive_type,
            cntl_id,
            removable: false,
            blksize: 0,
            sectors: 0,
            ctx: None,
        }
    }

    pub fn set_context<T: Any>(&mut self, ctx: Rc<T>) {
        self.ctx = Some(ctx);
    }

    /// Borrow the transport state, if it has the expected type.
    pub fn context<T: Any>(&self) -> Option<&T> {
        self.ctx.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drive")
            .field("drive_type", &self.drive_type)
            .field("cntl_id", &self.cntl_id)
            .field("removable", &self.removable)
            .field("blksize", &self.blksize)
            .field("sectors", &self.sectors)
            .finish()
    }
}

/// One transfer request against a drive.
pub struct DiskOp<'a> {
    pub drive: &'a Drive,
    pub lba: u64,
    /// Number of blocks to move. Transports clear it on failure.
    pub count: u16,
    pub buf: &'a mut [u8],
    /// Result of the last command issued with this operation.
    pub ret: DiskRet,
}

impl<'a> DiskOp<'a> {
    pub fn new(drive: &'a Drive, lba: u64, count: u16, buf: &'a mut [u8]) -> Self {
        DiskOp {
            drive,
            lba,
            count,
            buf,
            ret: DiskRet::Success,
        }
    }
}
