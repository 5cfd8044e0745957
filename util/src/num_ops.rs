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

// This module implements some operations of Rust primitive types.

/// Calculate the aligned-up u64 value.
///
/// # Arguments
///
/// * `origin` - the origin value.
/// * `align` - the alignment.
///
/// # Examples
///
/// ```rust
/// extern crate util;
/// use util::num_ops::round_up;
///
/// let value = round_up(1003 as u64, 4 as u64);
/// assert!(value == Some(1004));
/// ```
pub fn round_up(origin: u64, align: u64) -> Option<u64> {
    if align == 0 {
        return None;
    }
    match origin % align {
        0 => Some(origin),
        diff => origin.checked_add(align - diff),
    }
}

/// Decode a fixed-width, space padded ASCII field as found in SCSI
/// identification data. The field ends at the first NUL and trailing spaces
/// are removed.
///
/// # Examples
///
/// ```rust
/// extern crate util;
/// use util::num_ops::trim_padded;
///
/// assert_eq!(trim_padded(b"QEMU    "), "QEMU");
/// ```
pub fn trim_padded(field: &[u8]) -> String {
    let field = &field[..field.iter().position(|&c| c == 0).unwrap_or(field.len())];
    let end = field
        .iter()
        .rposition(|&c| c != b' ')
        .map_or(0, |pos| pos + 1);
    field[..end]
        .iter()
        .map(|&c| if c.is_ascii_graphic() || c == b' ' { c as char } else { '.' })
        .collect()
}
