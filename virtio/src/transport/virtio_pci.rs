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

use std::fmt;

use anyhow::{anyhow, Result};
use log::debug;

use crate::queue::{SplitVring, MAX_QUEUE_NUM};
use crate::{
    VirtioError, VIRTIO_CONFIG_S_ACKNOWLEDGE, VIRTIO_CONFIG_S_DRIVER, VIRTIO_CONFIG_S_DRIVER_OK,
};

/// Register level access to one virtio PCI function.
///
/// Platforms implement this over their PCI accessors; queue addresses are
/// the physical addresses of the ring parts.
pub trait VirtioPciOps {
    fn get_status(&self) -> u8;
    fn set_status(&self, status: u8);
    fn queue_select(&self, index: u16);
    /// Size of the selected queue, 0 if it does not exist.
    fn get_queue_size(&self) -> u16;
    fn set_queue_size(&self, size: u16);
    /// Hand the selected queue's rings to the device and enable it.
    fn activate_queue(&self, desc: u64, avail: u64, used: u64);
    fn queue_notify(&self, index: u16);
    /// Read the interrupt status, which also clears it.
    fn get_isr(&self) -> u8;
    /// Read device specific config space starting at `offset`.
    fn config_read(&self, offset: u64, data: &mut [u8]);
    fn config_write(&self, offset: u64, data: &[u8]);

    fn reset(&self) {
        self.set_status(0);
        // Reading ISR flushes any interrupt raised before the reset.
        self.get_isr();
    }

    fn set_acknowledge(&self) {
        let status = self.get_status() | VIRTIO_CONFIG_S_ACKNOWLEDGE;
        self.set_status(status);
    }

    fn set_driver(&self) {
        let status = self.get_status() | VIRTIO_CONFIG_S_DRIVER;
        self.set_status(status);
    }

    fn set_driver_ok(&self) {
        let status = self.get_status() | VIRTIO_CONFIG_S_DRIVER_OK;
        self.set_status(status);
    }

    /// Reset the device and announce a driver for it.
    fn start(&self) {
        self.reset();
        self.set_acknowledge();
        self.set_driver();
    }
}

/// A PCI function found by the platform's bus scan.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PciDevice {
    /// Bus, device and function packed as bus << 8 | dev << 3 | fn.
    pub bdf: u16,
    pub vendor_id: u16,
    pub device_id: u16,
}

impl PciDevice {
    pub fn bus(&self) -> u8 {
        (self.bdf >> 8) as u8
    }

    pub fn dev(&self) -> u8 {
        ((self.bdf >> 3) & 0x1f) as u8
    }

    pub fn func(&self) -> u8 {
        (self.bdf & 0x7) as u8
    }
}

impl fmt::Debug for PciDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}.{} [{:04x}:{:04x}]",
            self.bus(),
            self.dev(),
            self.func(),
            self.vendor_id,
            self.device_id
        )
    }
}

/// Set up queue `index` of the device with a freshly allocated ring.
///
/// # Arguments
///
/// * `ops` - The device's register interface.
/// * `index` - Queue index to bring up.
pub fn vp_find_vq(ops: &dyn VirtioPciOps, index: u16) -> Result<SplitVring> {
    ops.queue_select(index);
    let size = ops.get_queue_size();
    if size == 0 {
        return Err(anyhow!(VirtioError::QueueUnavailable(index)));
    }
    if size > MAX_QUEUE_NUM {
        return Err(anyhow!(VirtioError::QueueSize { index, size }));
    }
    debug!("queue {} size {}", index, size);

    let vring = SplitVring::new(index, size)?;
    ops.set_queue_size(size);
    ops.activate_queue(vring.desc_addr(), vring.avail_addr(), vring.used_addr());
    Ok(vring)
}
