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

pub mod error;

pub use error::ConfigError;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use devices::ScsiBootPath;
use virtio::ScsiCntlr::VIRTIO_SCSI_MAX_TARGET;

/// Most verbose firmware debug level.
pub const MAX_DEBUG_LEVEL: u8 = 8;

pub trait ConfigCheck {
    /// To check the legality of Config structure.
    ///
    /// # Errors
    ///
    /// * `IllegalValue` - A number is out of its range.
    /// * `FieldRepeat` - A boot order entry is listed twice.
    fn check(&self) -> Result<()>;
}

/// A boot order entry naming a SCSI device behind a PCI controller.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BootOrderEntry {
    pub bdf: u16,
    pub target: u16,
    #[serde(default)]
    pub lun: u16,
}

/// Block storage settings read from the firmware configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Scan virtio-scsi controllers.
    pub virtio_scsi: bool,
    /// Targets scanned on each controller.
    pub max_targets: u16,
    pub debug_level: u8,
    /// Devices to boot from, first entry first.
    pub boot_order: Vec<BootOrderEntry>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            virtio_scsi: true,
            max_targets: VIRTIO_SCSI_MAX_TARGET,
            debug_level: 1,
            boot_order: Vec::new(),
        }
    }
}

impl StorageConfig {
    /// Parse and check a JSON configuration blob.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StorageConfig = serde_json::from_str(json)
            .map_err(ConfigError::from)
            .with_context(|| "Failed to parse storage config")?;
        config.check()?;
        Ok(config)
    }

    /// The boot order as SCSI device paths.
    pub fn boot_paths(&self) -> Vec<ScsiBootPath> {
        self.boot_order
            .iter()
            .map(|e| ScsiBootPath {
                bdf: e.bdf,
                target: e.target,
                lun: e.lun,
            })
            .collect()
    }
}

impl ConfigCheck for StorageConfig {
    fn check(&self) -> Result<()> {
        if self.max_targets < 1 || self.max_targets > VIRTIO_SCSI_MAX_TARGET {
            return Err(anyhow!(ConfigError::IllegalValue(
                "max_targets".to_string(),
                1,
                true,
                u64::from(VIRTIO_SCSI_MAX_TARGET),
                true,
            )));
        }

        if self.debug_level > MAX_DEBUG_LEVEL {
            return Err(anyhow!(ConfigError::IllegalValue(
                "debug_level".to_string(),
                0,
                true,
                u64::from(MAX_DEBUG_LEVEL),
                true,
            )));
        }

        for (i, entry) in self.boot_order.iter().enumerate() {
            if self.boot_order[..i].contains(entry) {
                return Err(anyhow!(ConfigError::FieldRepeat(
                    format!("{:04x}/{}/{}", entry.bdf, entry.target, entry.lun),
                    "boot_order".to_string(),
                )));
            }
        }

        Ok(())
    }
}
