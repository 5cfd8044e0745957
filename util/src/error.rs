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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilError {
    // zone submodule error
    #[error("Zone {name} has no free block of {size} bytes.")]
    ZoneExhausted { name: String, size: u64 },
    #[error("Block 0x{0:x} is not allocated from this zone.")]
    ZoneBadFree(u64),
    #[error("Zone size {0} is invalid.")]
    ZoneInvalidSize(u64),
    // clock submodule error
    #[error("Counter frequency {0} kHz is invalid.")]
    ClockFrequency(u64),
    // logger submodule error
    #[error("Failed to install logger: {0}")]
    SetLogger(#[from] log::SetLoggerError),
}
