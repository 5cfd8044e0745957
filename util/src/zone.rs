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

//! Bounded memory zones for driver bookkeeping records.
//!
//! Firmware carves long lived records (one per discovered LUN, for example)
//! out of a small fixed region. The zone only tracks the address space, the
//! records themselves stay ordinary Rust values; a `ZoneBlock` is returned to
//! its zone when dropped.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use log::debug;

use crate::num_ops::round_up;
use crate::UtilError;

const ZONE_ALIGN: u64 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MemBlock {
    start: u64,
    size: u64,
}

struct ZoneInner {
    name: String,
    start: u64,
    end: u64,
    /// Free blocks sorted by address.
    free: Vec<MemBlock>,
    used: Vec<MemBlock>,
}

impl ZoneInner {
    fn alloc(&mut self, size: u64) -> Result<u64> {
        let alloc_size = round_up(size.max(1), ZONE_ALIGN)
            .ok_or_else(|| anyhow!(UtilError::ZoneInvalidSize(size)))?;
        let index = self
            .free
            .iter()
            .position(|mb| mb.size >= alloc_size)
            .ok_or_else(|| {
                anyhow!(UtilError::ZoneExhausted {
                    name: self.name.clone(),
                    size,
                })
            })?;

        let addr = self.free[index].start;
        if self.free[index].size == alloc_size {
            self.free.remove(index);
        } else {
            self.free[index].start += alloc_size;
            self.free[index].size -= alloc_size;
        }
        self.used.push(MemBlock {
            start: addr,
            size: alloc_size,
        });
        Ok(addr)
    }

    fn free(&mut self, addr: u64) -> Result<()> {
        if addr < self.start || addr >= self.end {
            return Err(anyhow!(UtilError::ZoneBadFree(addr)));
        }
        let index = self
            .used
            .iter()
            .position(|mb| mb.start == addr)
            .ok_or_else(|| anyhow!(UtilError::ZoneBadFree(addr)))?;
        let block = self.used.swap_remove(index);

        let pos = self.free.partition_point(|mb| mb.start < block.start);
        self.free.insert(pos, block);
        // Merge with the neighbours so large requests keep fitting.
        if pos + 1 < self.free.len()
            && self.free[pos].start + self.free[pos].size == self.free[pos + 1].start
        {
            self.free[pos].size += self.free[pos + 1].size;
            self.free.remove(pos + 1);
        }
        if pos > 0 && self.free[pos - 1].start + self.free[pos - 1].size == self.free[pos].start {
            self.free[pos - 1].size += self.free[pos].size;
            self.free.remove(pos);
        }
        Ok(())
    }
}

/// First-fit allocator over a fixed address range.
#[derive(Clone)]
pub struct ZoneAllocator {
    inner: Rc<RefCell<ZoneInner>>,
}

impl ZoneAllocator {
    /// Create a zone covering `[start, start + size)`.
    pub fn new(name: &str, start: u64, size: u64) -> Result<Self> {
        let end = start
            .checked_add(size)
            .filter(|_| size != 0)
            .ok_or_else(|| anyhow!(UtilError::ZoneInvalidSize(size)))?;
        Ok(Self {
            inner: Rc::new(RefCell::new(ZoneInner {
                name: name.to_string(),
                start,
                end,
                free: vec![MemBlock { start, size }],
                used: Vec::new(),
            })),
        })
    }

    /// Reserve `size` bytes. The block goes back to the zone on drop.
    pub fn alloc(&self, size: u64) -> Result<ZoneBlock> {
        let addr = self.inner.borrow_mut().alloc(size)?;
        Ok(ZoneBlock {
            zone: self.clone(),
            addr,
            size,
        })
    }

    /// Bytes still available, ignoring fragmentation.
    pub fn free_bytes(&self) -> u64 {
        self.inner.borrow().free.iter().map(|mb| mb.size).sum()
    }

    pub fn used_blocks(&self) -> usize {
        self.inner.borrow().used.len()
    }
}

/// An allocation owned by its holder.
pub struct ZoneBlock {
    zone: ZoneAllocator,
    addr: u64,
    size: u64,
}

impl ZoneBlock {
    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for ZoneBlock {
    fn drop(&mut self) {
        if let Err(e) = self.zone.inner.borrow_mut().free(self.addr) {
            debug!("Zone release of 0x{:x} failed: {:?}", self.addr, e);
        }
    }
}

impl std::fmt::Debug for ZoneBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneBlock")
            .field("addr", &self.addr)
            .field("size", &self.size)
            .finish()
    }
}
