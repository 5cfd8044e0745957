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

mod split;

pub use split::*;

use util::byte_code::ByteCode;

/// This marks a buffer as continuing via the next field.
pub const VRING_DESC_F_NEXT: u16 = 0x1;
/// This marks a buffer as write-only (otherwise read-only).
pub const VRING_DESC_F_WRITE: u16 = 0x2;
/// Tell the device not to interrupt when it consumes a buffer.
pub const VRING_AVAIL_F_NO_INTERRUPT: u16 = 1;
/// Largest queue the driver is willing to set up.
pub const MAX_QUEUE_NUM: u16 = 128;
/// Alignment of the used ring in the legacy PCI layout.
pub const VIRTIO_PCI_VRING_ALIGN: u64 = 4096;

/// Descriptor table entry, as laid out in the ring memory.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VringDesc {
    /// Address of the buffer.
    pub addr: u64,
    /// Length of the buffer.
    pub len: u32,
    pub flags: u16,
    /// Index of the chained descriptor, valid with `VRING_DESC_F_NEXT`.
    pub next: u16,
}

impl ByteCode for VringDesc {}

/// Used ring element written back by the device.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct VringUsedElem {
    /// Head of the completed chain.
    pub id: u32,
    /// Bytes written into the chain's device writable buffers.
    pub len: u32,
}

impl ByteCode for VringUsedElem {}

/// One buffer of a request chain.
#[derive(Clone, Copy, Debug)]
pub struct DescEntry {
    pub addr: u64,
    pub len: u32,
    /// Device writable.
    pub write: bool,
}

impl DescEntry {
    /// Entry covering the whole of `buf`.
    pub fn from_slice(buf: &[u8], write: bool) -> Self {
        DescEntry {
            addr: buf.as_ptr() as u64,
            len: buf.len() as u32,
            write,
        }
    }
}
