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

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::size_of;
use std::num::Wrapping;
use std::ptr::{read_volatile, write_volatile, NonNull};
use std::sync::atomic::{fence, Ordering};

use anyhow::{anyhow, bail, Result};

use super::{
    DescEntry, VringDesc, VringUsedElem, MAX_QUEUE_NUM, VIRTIO_PCI_VRING_ALIGN,
    VRING_AVAIL_F_NO_INTERRUPT, VRING_DESC_F_NEXT, VRING_DESC_F_WRITE,
};
use crate::{VirtioError, VirtioPciOps};
use util::num_ops::round_up;

/// The length of virtio descriptor.
const DESCRIPTOR_LEN: u64 = size_of::<VringDesc>() as u64;
/// The length of used element.
const USEDELEM_LEN: u64 = size_of::<VringUsedElem>() as u64;
/// The length of avail element.
const AVAILELEM_LEN: u64 = size_of::<u16>() as u64;
/// flags: u16, idx: u16 and the trailing event index: u16.
const VRING_LEN_EXCEPT_ELEM: u64 = (size_of::<u16>() * 3) as u64;
/// The position of idx in the available ring and the used ring.
const VRING_IDX_POSITION: usize = size_of::<u16>();
/// The position of the first element in the available ring and the used ring.
const VRING_RING_POSITION: usize = size_of::<u16>() * 2;

/// Offsets of the available and used rings plus the total size, in bytes.
fn vring_layout(size: u16) -> Option<(u64, u64, u64)> {
    let size = u64::from(size);
    let avail = DESCRIPTOR_LEN * size;
    let used = round_up(
        avail + VRING_LEN_EXCEPT_ELEM + AVAILELEM_LEN * size,
        VIRTIO_PCI_VRING_ALIGN,
    )?;
    Some((avail, used, used + VRING_LEN_EXCEPT_ELEM + USEDELEM_LEN * size))
}

/// Bytes of ring memory a queue of `size` entries occupies.
pub fn get_vring_size(size: u16) -> Option<u64> {
    vring_layout(size).map(|(_, _, total)| total)
}

/// Driver side of a split virtqueue.
///
/// The ring lives in page aligned memory owned by this object and is shared
/// with the device by address, so every ring access is volatile and little
/// endian. Descriptors not in flight form a free list through their `next`
/// fields.
pub struct SplitVring {
    base: NonNull<u8>,
    layout: Layout,
    /// Queue index on the device.
    index: u16,
    size: u16,
    avail_off: usize,
    used_off: usize,
    free_head: u16,
    num_free: u16,
    /// Chains put in the available ring since the last kick.
    num_added: u16,
    avail_idx: Wrapping<u16>,
    last_used_idx: Wrapping<u16>,
}

impl SplitVring {
    /// Allocate a zeroed ring for queue `index`.
    ///
    /// # Arguments
    ///
    /// * `index` - Queue index on the device, used when notifying.
    /// * `size` - Number of descriptors, 1 to `MAX_QUEUE_NUM`.
    pub fn new(index: u16, size: u16) -> Result<Self> {
        if size == 0 || size > MAX_QUEUE_NUM {
            return Err(anyhow!(VirtioError::QueueSize { index, size }));
        }
        let (avail, used, total) =
            vring_layout(size).ok_or_else(|| anyhow!(VirtioError::VringAlloc(size)))?;
        let layout = Layout::from_size_align(total as usize, VIRTIO_PCI_VRING_ALIGN as usize)
            .map_err(|_| anyhow!(VirtioError::VringAlloc(size)))?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or_else(|| anyhow!(VirtioError::VringAlloc(size)))?;

        let vring = SplitVring {
            base,
            layout,
            index,
            size,
            avail_off: avail as usize,
            used_off: used as usize,
            free_head: 0,
            num_free: size,
            num_added: 0,
            avail_idx: Wrapping(0),
            last_used_idx: Wrapping(0),
        };
        for i in 0..size - 1 {
            vring.write_u16(vring.desc_off(i) + 14, i + 1);
        }
        // Completion is polled.
        vring.write_u16(vring.avail_off, VRING_AVAIL_F_NO_INTERRUPT);
        Ok(vring)
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn num_free(&self) -> u16 {
        self.num_free
    }

    pub fn desc_addr(&self) -> u64 {
        self.base.as_ptr() as u64
    }

    pub fn avail_addr(&self) -> u64 {
        self.desc_addr() + self.avail_off as u64
    }

    pub fn used_addr(&self) -> u64 {
        self.desc_addr() + self.used_off as u64
    }

    fn desc_off(&self, idx: u16) -> usize {
        idx as usize * DESCRIPTOR_LEN as usize
    }

    fn check_off(&self, off: usize, len: usize) {
        debug_assert!(off + len <= self.layout.size() && off % len == 0);
    }

    fn read_u16(&self, off: usize) -> u16 {
        self.check_off(off, 2);
        // SAFETY: off is in bounds and aligned, checked by callers' layout.
        u16::from_le(unsafe { read_volatile(self.base.as_ptr().add(off).cast::<u16>()) })
    }

    fn write_u16(&self, off: usize, val: u16) {
        self.check_off(off, 2);
        // SAFETY: off is in bounds and aligned, checked by callers' layout.
        unsafe { write_volatile(self.base.as_ptr().add(off).cast::<u16>(), val.to_le()) }
    }

    fn read_u32(&self, off: usize) -> u32 {
        self.check_off(off, 4);
        // SAFETY: off is in bounds and aligned, checked by callers' layout.
        u32::from_le(unsafe { read_volatile(self.base.as_ptr().add(off).cast::<u32>()) })
    }

    fn write_u32(&self, off: usize, val: u32) {
        self.check_off(off, 4);
        // SAFETY: off is in bounds and aligned, checked by callers' layout.
        unsafe { write_volatile(self.base.as_ptr().add(off).cast::<u32>(), val.to_le()) }
    }

    fn write_u64(&self, off: usize, val: u64) {
        self.check_off(off, 8);
        // SAFETY: off is in bounds and aligned, checked by callers' layout.
        unsafe { write_volatile(self.base.as_ptr().add(off).cast::<u64>(), val.to_le()) }
    }

    /// Read back descriptor `idx`.
    pub fn desc(&self, idx: u16) -> VringDesc {
        let off = self.desc_off(idx);
        let lo = u64::from(self.read_u32(off));
        let hi = u64::from(self.read_u32(off + 4));
        VringDesc {
            addr: hi << 32 | lo,
            len: self.read_u32(off + 8),
            flags: self.read_u16(off + 12),
            next: self.read_u16(off + 14),
        }
    }

    /// Chain `entries` into the descriptor table and offer the chain.
    ///
    /// The device sees the chain after the next `kick`. Device writable
    /// entries must come after all device readable ones.
    ///
    /// Returns the head descriptor index of the chain.
    pub fn add_chained(&mut self, entries: &[DescEntry]) -> Result<u16> {
        if entries.is_empty() {
            bail!("Empty descriptor chain for queue {}", self.index);
        }
        if entries.windows(2).any(|pair| pair[0].write && !pair[1].write) {
            return Err(anyhow!(VirtioError::ChainOrder));
        }
        if entries.len() > self.num_free as usize {
            return Err(anyhow!(VirtioError::QueueFull {
                need: entries.len(),
                free: self.num_free,
            }));
        }

        let head = self.free_head;
        let mut idx = head;
        for (i, entry) in entries.iter().enumerate() {
            let mut flags = if entry.write { VRING_DESC_F_WRITE } else { 0 };
            if i + 1 < entries.len() {
                flags |= VRING_DESC_F_NEXT;
            }
            let off = self.desc_off(idx);
            self.write_u64(off, entry.addr);
            self.write_u32(off + 8, entry.len);
            self.write_u16(off + 12, flags);
            // The free list already links the chain through `next`.
            idx = self.read_u16(off + 14);
        }
        self.free_head = idx;
        self.num_free -= entries.len() as u16;

        let slot = (self.avail_idx + Wrapping(self.num_added)).0 % self.size;
        self.write_u16(
            self.avail_off + VRING_RING_POSITION + slot as usize * AVAILELEM_LEN as usize,
            head,
        );
        self.num_added += 1;
        Ok(head)
    }

    /// Publish the chains added since the last kick and notify the device.
    pub fn kick(&mut self, ops: &dyn VirtioPciOps) {
        // Make sure the descriptors are visible before the index moves.
        fence(Ordering::Release);
        self.avail_idx += Wrapping(self.num_added);
        self.write_u16(self.avail_off + VRING_IDX_POSITION, self.avail_idx.0);
        self.num_added = 0;
        fence(Ordering::SeqCst);
        ops.queue_notify(self.index);
    }

    /// Whether the device returned chains not yet collected.
    pub fn more_used(&self) -> bool {
        let used_idx = self.read_u16(self.used_off + VRING_IDX_POSITION);
        // Used elements are read only after the index.
        fence(Ordering::Acquire);
        used_idx != self.last_used_idx.0
    }

    /// Collect the next completed chain.
    ///
    /// Returns the chain head and the length the device reported, or None if
    /// nothing completed. The chain's descriptors go back to the free list.
    pub fn get_buf(&mut self) -> Result<Option<(u16, u32)>> {
        if !self.more_used() {
            return Ok(None);
        }
        let slot = (self.last_used_idx.0 % self.size) as usize;
        let off = self.used_off + VRING_RING_POSITION + slot * USEDELEM_LEN as usize;
        let id = self.read_u32(off);
        let len = self.read_u32(off + 4);
        if id >= u32::from(self.size) {
            return Err(anyhow!(VirtioError::InvalidHead(id)));
        }

        self.detach(id as u16)?;
        self.last_used_idx += Wrapping(1);
        Ok(Some((id as u16, len)))
    }

    fn detach(&mut self, head: u16) -> Result<()> {
        let mut idx = head;
        let mut count = 1;
        while self.read_u16(self.desc_off(idx) + 12) & VRING_DESC_F_NEXT != 0 {
            idx = self.read_u16(self.desc_off(idx) + 14);
            count += 1;
            if count > self.size || idx >= self.size {
                return Err(anyhow!(VirtioError::InvalidHead(u32::from(head))));
            }
        }
        self.write_u16(self.desc_off(idx) + 14, self.free_head);
        self.free_head = head;
        self.num_free += count;
        Ok(())
    }
}

impl Drop for SplitVring {
    fn drop(&mut self) {
        // SAFETY: base was allocated with this layout in new().
        unsafe { dealloc(self.base.as_ptr(), self.layout) }
    }
}
