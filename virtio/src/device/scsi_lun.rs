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

use std::cell::RefCell;
use std::mem::size_of;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use log::{info, warn};

use crate::queue::SplitVring;
use crate::transport::virtio_pci::{PciDevice, VirtioPciOps};
use devices::block::DISK_SECTOR_SIZE;
use devices::ScsiDisk::scsi_init_drive;
use devices::{BootRegistry, CdbDispatcher, DiskError, Drive, DriveType};
use util::clock::TimeSource;
use util::zone::{ZoneAllocator, ZoneBlock};

/// Per LUN state reached from the drive's context.
pub struct VirtioLunCtx {
    pub ops: Rc<dyn VirtioPciOps>,
    /// Request queue shared by every LUN of the controller.
    pub vq: Rc<RefCell<SplitVring>>,
    pub bdf: u16,
    pub target: u16,
    pub lun: u16,
    /// Firmware memory backing this record, released with it.
    _record: ZoneBlock,
}

/// Everything discovery needs besides the controller itself.
pub struct ScsiScanEnv<'a> {
    pub dispatch: &'a CdbDispatcher,
    pub clock: &'a dyn TimeSource,
    /// Zone the LUN records are carved from.
    pub zone: &'a ZoneAllocator,
    pub boot: &'a mut dyn BootRegistry,
}

/// Scan one LUN and hand it to the boot registry if it is usable.
///
/// The LUN record is released again when identification fails or the drive
/// is rejected.
pub fn virtio_scsi_add_lun(
    pci: &PciDevice,
    ops: &Rc<dyn VirtioPciOps>,
    vq: &Rc<RefCell<SplitVring>>,
    target: u16,
    lun: u16,
    env: &mut ScsiScanEnv,
) -> Result<()> {
    let size = size_of::<VirtioLunCtx>() as u64;
    let record = env.zone.alloc(size).map_err(|e| {
        warn!("Failed to allocate virtio-scsi lun: {}", e);
        anyhow!(DiskError::Allocation(size))
    })?;

    let mut drive = Drive::new(DriveType::VirtioScsi, u32::from(pci.bdf));
    drive.set_context(Rc::new(VirtioLunCtx {
        ops: ops.clone(),
        vq: vq.clone(),
        bdf: pci.bdf,
        target,
        lun,
        _record: record,
    }));

    let label = DriveType::VirtioScsi.to_string();
    let info = scsi_init_drive(env.dispatch, env.clock, &mut drive, &label)?;
    let prio = env.boot.find_boot_priority(pci.bdf, target, lun);

    if info.is_cdrom() {
        env.boot.register_optical(drive, info.desc, prio);
        return Ok(());
    }
    if drive.blksize != DISK_SECTOR_SIZE {
        info!("Unsupported block size {}", drive.blksize);
        return Err(anyhow!(DiskError::UnsupportedGeometry(drive.blksize)));
    }
    env.boot.register_hard_disk(drive, info.desc, prio);
    Ok(())
}

/// Scan a target. Only LUN 0 is looked at.
pub fn virtio_scsi_scan_target(
    pci: &PciDevice,
    ops: &Rc<dyn VirtioPciOps>,
    vq: &Rc<RefCell<SplitVring>>,
    target: u16,
    env: &mut ScsiScanEnv,
) -> Result<()> {
    // TODO: send REPORT LUNS to find the other LUNs of the target.
    virtio_scsi_add_lun(pci, ops, vq, target, 0, env)
}
