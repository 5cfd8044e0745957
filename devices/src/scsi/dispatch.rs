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

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use log::{debug, warn};

use crate::error::disk_ret;
use crate::ScsiCdb::CommandBlock;
use crate::{DiskError, DiskOp, DriveType};

/// A transport able to carry SCSI command blocks to its drives.
pub trait CdbBackend {
    /// Issue `cdb` to the drive of `op`.
    ///
    /// # Arguments
    ///
    /// * `op` - Target drive, block count and data buffer. The transfer
    ///   length is `blocksize * op.count` bytes.
    /// * `cdb` - The command block to send.
    /// * `blocksize` - Size of one transferred block in bytes.
    fn cmd_data(&self, op: &mut DiskOp, cdb: &CommandBlock, blocksize: u16) -> Result<()>;
}

/// Routes command blocks to the backend registered for a drive's type.
#[derive(Default)]
pub struct CdbDispatcher {
    backends: HashMap<DriveType, Rc<dyn CdbBackend>>,
}

impl CdbDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the backend serving `drive_type`, replacing any previous one.
    pub fn register(&mut self, drive_type: DriveType, backend: Rc<dyn CdbBackend>) -> Result<()> {
        if !drive_type.is_cdb_capable() {
            return Err(anyhow!(DiskError::Parameter(format!(
                "{} drives do not accept command blocks",
                drive_type
            ))));
        }
        if self.backends.insert(drive_type, backend).is_some() {
            warn!("Replacing the {} command transport", drive_type);
        }
        Ok(())
    }

    pub fn has_backend(&self, drive_type: DriveType) -> bool {
        self.backends.contains_key(&drive_type)
    }

    /// Execute a command block on the drive of `op`.
    ///
    /// Drives without a registered transport fail with a parameter error,
    /// `op.count` is cleared and no backend is touched. `op.ret` reflects the
    /// outcome in every case.
    pub fn cdb_cmd_data(&self, op: &mut DiskOp, cdb: &CommandBlock, blocksize: u16) -> Result<()> {
        let drive_type = op.drive.drive_type;
        let result = match self.backends.get(&drive_type) {
            Some(backend) => backend.cmd_data(op, cdb, blocksize),
            None => {
                op.count = 0;
                Err(anyhow!(DiskError::Parameter(format!(
                    "no command transport for {} drive",
                    drive_type
                ))))
            }
        };
        op.ret = disk_ret(&result);
        if let Err(e) = &result {
            debug!(
                "{} drive {:x}: command {:02x} failed: {:?}",
                drive_type,
                op.drive.cntl_id,
                cdb.opcode(),
                e
            );
        }
        result
    }
}
