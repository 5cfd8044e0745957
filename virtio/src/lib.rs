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

//! # Virtio
//!
//! Boot time virtio drivers.
//!
//! ## Design
//!
//! This module offers support for:
//! 1. The driver side of split virtqueues, polled without interrupts.
//! 2. The register contract of virtio PCI functions.
//! 3. The virtio-scsi controller driver and its LUN discovery.

pub mod device;
pub mod error;
pub mod queue;
pub mod transport;

pub use device::scsi_cntlr as ScsiCntlr;
pub use device::scsi_lun as ScsiLun;
pub use error::VirtioError;
pub use queue::*;
pub use transport::virtio_pci::{vp_find_vq, PciDevice, VirtioPciOps};

/// Device status bits, refer to Virtio Spec.
pub const VIRTIO_CONFIG_S_ACKNOWLEDGE: u8 = 1;
pub const VIRTIO_CONFIG_S_DRIVER: u8 = 2;
pub const VIRTIO_CONFIG_S_DRIVER_OK: u8 = 4;

/// PCI identity of transitional virtio devices.
pub const PCI_VENDOR_ID_REDHAT_QUMRANET: u16 = 0x1af4;
pub const PCI_DEVICE_ID_VIRTIO_SCSI: u16 = 0x1004;
