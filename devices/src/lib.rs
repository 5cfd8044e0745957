// Copyright (c) 2020 Huawei Technologies Co.,Ltd. All rights reserved.
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

//! Drive model shared by the boot block-storage transports.
//!
//! This crate provides:
//! - the drive and disk operation types handed between transports
//! - the SCSI command block layer (codec, dispatch, readiness, drive init)
//! - the boot registration interface

pub mod block;
pub mod boot;
pub mod error;
pub mod scsi;

pub use block::{DiskOp, DiskRet, Drive, DriveType};
pub use boot::{BootEntry, BootKind, BootMenu, BootRegistry, ScsiBootPath};
pub use error::DiskError;
pub use scsi::cdb as ScsiCdb;
pub use scsi::disk as ScsiDisk;
pub use scsi::dispatch::{CdbBackend, CdbDispatcher};
