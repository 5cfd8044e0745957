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

use std::mem::size_of;
use std::ptr::read_unaligned;
use std::slice::from_raw_parts;

/// Plain-old-data layouts shared with a device, such as a virtio config space.
///
/// Implementors must be `#[repr(C)]` or `#[repr(C, packed)]` and contain only
/// integers or integer arrays, so that every byte pattern is a valid value.
pub trait ByteCode: Default + Copy {
    /// Return the raw bytes of the object, in host byte order.
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: Self is plain data and fully initialized.
        unsafe { from_raw_parts(self as *const Self as *const u8, size_of::<Self>()) }
    }

    /// Copy an object out of a byte slice of exactly `size_of::<Self>()` bytes.
    ///
    /// # Arguments
    ///
    /// * `data` - the bytes read from the device.
    fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != size_of::<Self>() {
            return None;
        }

        // SAFETY: Length is checked above, and any byte pattern is valid for Self.
        Some(unsafe { read_unaligned(data.as_ptr().cast::<Self>()) })
    }
}

impl ByteCode for u8 {}
impl ByteCode for u16 {}
impl ByteCode for u32 {}
impl ByteCode for u64 {}
