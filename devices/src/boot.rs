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

use std::rc::Rc;

use log::info;

use crate::Drive;

/// Priority of devices missing from the boot order.
pub const DEFAULT_PRIO: i32 = 9999;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootKind {
    HardDisk,
    Optical,
}

/// Sink for bootable drives found during discovery.
pub trait BootRegistry {
    /// Position of a SCSI device in the boot order, or -1 if unlisted.
    ///
    /// # Arguments
    ///
    /// * `bdf` - PCI address of the controller.
    /// * `target` - SCSI target id.
    /// * `lun` - Logical unit number.
    fn find_boot_priority(&self, bdf: u16, target: u16, lun: u16) -> i32;

    fn register_hard_disk(&mut self, drive: Drive, desc: String, prio: i32);

    fn register_optical(&mut self, drive: Drive, desc: String, prio: i32);
}

/// A SCSI boot order entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScsiBootPath {
    pub bdf: u16,
    pub target: u16,
    pub lun: u16,
}

pub struct BootEntry {
    pub kind: BootKind,
    pub drive: Rc<Drive>,
    pub desc: String,
    pub prio: i32,
}

/// Boot device list kept in priority order.
#[derive(Default)]
pub struct BootMenu {
    order: Vec<ScsiBootPath>,
    entries: Vec<BootEntry>,
}

impl BootMenu {
    pub fn new(order: Vec<ScsiBootPath>) -> Self {
        BootMenu {
            order,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, kind: BootKind, drive: Drive, desc: String, prio: i32) {
        let prio = if prio < 0 { DEFAULT_PRIO } else { prio };
        info!("Registering bootable: {} (prio {})", desc, prio);
        // Equal priorities keep discovery order.
        let pos = self.entries.partition_point(|e| e.prio <= prio);
        self.entries.insert(
            pos,
            BootEntry {
                kind,
                drive: Rc::new(drive),
                desc,
                prio,
            },
        );
    }

    pub fn entries(&self) -> &[BootEntry] {
        &self.entries
    }

    pub fn count(&self, kind: BootKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn drives(&self, kind: BootKind) -> impl Iterator<Item = &Rc<Drive>> {
        self.entries
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| &e.drive)
    }
}

impl BootRegistry for BootMenu {
    fn find_boot_priority(&self, bdf: u16, target: u16, lun: u16) -> i32 {
        let path = ScsiBootPath { bdf, target, lun };
        self.order
            .iter()
            .position(|p| *p == path)
            .map_or(-1, |pos| pos as i32)
    }

    fn register_hard_disk(&mut self, drive: Drive, desc: String, prio: i32) {
        self.add(BootKind::HardDisk, drive, desc, prio);
    }

    fn register_optical(&mut self, drive: Drive, desc: String, prio: i32) {
        self.add(BootKind::Optical, drive, desc, prio);
    }
}
