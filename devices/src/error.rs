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

use anyhow::Result;
use thiserror::Error;

use crate::block::DiskRet;

#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Invalid disk operation: {0}")]
    Parameter(String),
    #[error("Transport failed the command, response {response}, status {status}")]
    Transport { response: u8, status: u8 },
    #[error("Timed out waiting for the drive to become ready")]
    Timeout,
    #[error("No medium present")]
    MediumAbsent,
    #[error("Unsupported block size {0}")]
    UnsupportedGeometry(u32),
    #[error("Failed to allocate {0} bytes for the drive record")]
    Allocation(u64),
    #[error("{what} response of {len} bytes is too short")]
    ShortResponse { what: &'static str, len: usize },
}

impl DiskError {
    pub fn disk_ret(&self) -> DiskRet {
        match self {
            DiskError::Parameter(_) | DiskError::UnsupportedGeometry(_) => DiskRet::EParam,
            DiskError::Transport { .. } | DiskError::ShortResponse { .. } => DiskRet::EBadTrack,
            DiskError::Timeout => DiskRet::ETimeout,
            DiskError::MediumAbsent => DiskRet::EMedia,
            DiskError::Allocation(_) => DiskRet::EController,
        }
    }
}

/// Collapse a command result into the disk service return code.
///
/// Errors that did not originate from the disk layer are reported as
/// transfer failures.
pub fn disk_ret<T>(result: &Result<T>) -> DiskRet {
    match result {
        Ok(_) => DiskRet::Success,
        Err(e) => e
            .downcast_ref::<DiskError>()
            .map_or(DiskRet::EBadTrack, DiskError::disk_ret),
    }
}
