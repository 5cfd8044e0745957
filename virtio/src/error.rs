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
pub enum VirtioError {
    #[error("Queue {0} is not available")]
    QueueUnavailable(u16),
    #[error("Queue {index} size {size} is invalid")]
    QueueSize { index: u16, size: u16 },
    #[error("Failed to allocate vring of {0} entries")]
    VringAlloc(u16),
    #[error("Vring is full: need {need} descriptors, {free} free")]
    QueueFull { need: usize, free: u16 },
    #[error("Device writable descriptors must follow the readable ones")]
    ChainOrder,
    #[error("Used ring returned invalid head {0}")]
    InvalidHead(u32),
}
