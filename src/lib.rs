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

//! # Bootblk
//!
//! Firmware block storage bring-up: finds the SCSI drives behind the boot
//! time controllers, registers them as boot candidates and returns the
//! command dispatcher later disk requests go through.

pub mod config;

pub use config::{BootOrderEntry, ConfigCheck, ConfigError, StorageConfig};

use std::io::Write;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{debug, info};

use devices::{BootMenu, BootRegistry, CdbDispatcher, DriveType};
use util::clock::TimeSource;
use util::logger::{init_log, level_from_debug};
use util::zone::ZoneAllocator;
use virtio::ScsiCntlr::{virtio_scsi_setup, VirtioScsiBackend};
use virtio::ScsiLun::ScsiScanEnv;
use virtio::{PciDevice, VirtioPciOps};

/// Route log output to the firmware debug console.
pub fn init_logging(config: &StorageConfig, console: Box<dyn Write + Send>) -> Result<()> {
    init_log(console, level_from_debug(config.debug_level))
}

/// Empty boot menu ordered by the configured boot order.
pub fn boot_menu(config: &StorageConfig) -> BootMenu {
    BootMenu::new(config.boot_paths())
}

/// Set up block storage.
///
/// Every usable drive is handed to `boot`. Controllers or drives that fail
/// are logged and skipped; only an invalid configuration is an error.
///
/// # Arguments
///
/// * `config` - Storage settings.
/// * `pci_devs` - PCI functions found by the bus scan.
/// * `open` - Maps a virtio function to its register interface.
/// * `zone` - Firmware memory the drive records are carved from.
/// * `boot` - Receives the bootable drives.
/// * `clock` - Time source for command polling and readiness deadlines.
pub fn block_setup<F>(
    config: &StorageConfig,
    pci_devs: &[PciDevice],
    open: F,
    zone: &ZoneAllocator,
    boot: &mut dyn BootRegistry,
    clock: Rc<dyn TimeSource>,
) -> Result<CdbDispatcher>
where
    F: Fn(&PciDevice) -> Result<Rc<dyn VirtioPciOps>>,
{
    config.check().with_context(|| "Invalid storage config")?;

    let mut dispatch = CdbDispatcher::new();
    if !config.virtio_scsi {
        debug!("virtio-scsi disabled");
        return Ok(dispatch);
    }

    dispatch.register(
        DriveType::VirtioScsi,
        Rc::new(VirtioScsiBackend::new(clock.clone())),
    )?;
    let mut env = ScsiScanEnv {
        dispatch: &dispatch,
        clock: clock.as_ref(),
        zone,
        boot,
    };
    let count = virtio_scsi_setup(pci_devs, open, config.max_targets, &mut env);
    info!("virtio-scsi: {} drive(s) registered", count);
    Ok(dispatch)
}
