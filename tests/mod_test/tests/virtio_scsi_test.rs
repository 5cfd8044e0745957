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

use std::mem::size_of;
use std::rc::Rc;

use devices::error::disk_ret;
use devices::scsi::cmd::{cdb_mode_sense_geom, cdb_read, cdb_write};
use devices::ScsiCdb::{
    CHECK_CONDITION, GOOD, INQUIRY, READ_CAPACITY_10, REQUEST_SENSE, TEST_UNIT_READY,
};
use devices::{BootKind, BootMenu, CdbDispatcher, DiskError, DiskOp, DiskRet, ScsiBootPath};
use mod_test::libdevice::machine::TestStdMachine;
use mod_test::libdevice::virtio_scsi::{ScsiTarget, TestVirtioScsi, TYPE_ROM};
use mod_test::utils::random_blocks;
use util::byte_code::ByteCode;
use virtio::ScsiCntlr::{
    virtio_scsi_setup, VirtioScsiConfig, VIRTIO_SCSI_S_BAD_TARGET, VIRTIO_SCSI_S_FAILURE,
    VIRTIO_SCSI_S_OK,
};
use virtio::{
    VirtioError, VIRTIO_CONFIG_S_ACKNOWLEDGE, VIRTIO_CONFIG_S_DRIVER, VIRTIO_CONFIG_S_DRIVER_OK,
    PCI_DEVICE_ID_VIRTIO_SCSI, PCI_VENDOR_ID_REDHAT_QUMRANET,
};

const TEST_SCSI_BDF: u16 = 0x28;
const TEST_MAX_TARGETS: u16 = 8;
const TEST_DISK_SECTORS: u64 = 2048;

const REQ_LEN: u32 = 51;
const RESP_LEN: u32 = 108;

const STATUS_RUNNING: u8 =
    VIRTIO_CONFIG_S_ACKNOWLEDGE | VIRTIO_CONFIG_S_DRIVER | VIRTIO_CONFIG_S_DRIVER_OK;
const STATUS_PROBING: u8 = VIRTIO_CONFIG_S_ACKNOWLEDGE | VIRTIO_CONFIG_S_DRIVER;

/// Scan every controller of `machine` the way the block setup does.
fn scsi_setup(
    machine: &TestStdMachine,
    order: Vec<ScsiBootPath>,
) -> (usize, CdbDispatcher, BootMenu) {
    let dispatch = machine.dispatcher();
    let mut menu = BootMenu::new(order);
    let count = {
        let mut env = machine.scan_env(&dispatch, &mut menu);
        virtio_scsi_setup(
            &machine.pci_devices(),
            |pci| machine.open(pci),
            TEST_MAX_TARGETS,
            &mut env,
        )
    };
    (count, dispatch, menu)
}

/// A machine with one controller holding `targets`.
fn scsi_machine(targets: Vec<(u16, ScsiTarget)>) -> (TestStdMachine, Rc<TestVirtioScsi>) {
    let mut machine = TestStdMachine::new();
    let dev = machine.add_virtio_scsi(TEST_SCSI_BDF, TestVirtioScsi::new());
    for (id, target) in targets {
        dev.add_target(id, target);
    }
    (machine, dev)
}

fn opcodes(dev: &TestVirtioScsi) -> Vec<u8> {
    dev.requests().iter().map(|r| r.opcode).collect()
}

/// Virtio-scsi hard disk discovery.
/// TestStep:
///   1. Plug hard disks in at targets 3 and 7.
///   2. Scan targets 0 to 7.
/// Expect:
///   1. Two hard disks are registered, in discovery order.
///   2. Empty targets answer VIRTIO_SCSI_S_BAD_TARGET to INQUIRY and nothing else.
///   3. The device ends with DRIVER_OK set.
#[test]
fn scsi_hd_discovery_test() {
    let (machine, dev) = scsi_machine(vec![
        (3, ScsiTarget::disk(TEST_DISK_SECTORS)),
        (7, ScsiTarget::disk(TEST_DISK_SECTORS)),
    ]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 2);
    assert_eq!(menu.count(BootKind::HardDisk), 2);
    assert_eq!(menu.count(BootKind::Optical), 0);
    let desc: Vec<&str> = menu.entries().iter().map(|e| e.desc.as_str()).collect();
    assert_eq!(
        desc,
        vec![
            "virtio-scsi Drive QEMU QEMU HARDDISK 2.5+",
            "virtio-scsi Drive QEMU QEMU HARDDISK 2.5+"
        ]
    );
    for drive in menu.drives(BootKind::HardDisk) {
        assert_eq!(drive.blksize, 512);
        assert_eq!(drive.sectors, TEST_DISK_SECTORS);
        assert_eq!(drive.cntl_id, u32::from(TEST_SCSI_BDF));
        assert!(!drive.removable);
    }

    let requests = dev.requests();
    for req in requests.iter().filter(|r| r.target != 3 && r.target != 7) {
        assert_eq!(req.opcode, INQUIRY);
        assert_eq!(req.response, VIRTIO_SCSI_S_BAD_TARGET);
    }
    assert_eq!(
        requests.iter().filter(|r| r.opcode == INQUIRY).count(),
        TEST_MAX_TARGETS as usize
    );
    assert!(requests.iter().all(|r| r.lun == 0));

    assert_eq!(dev.status(), STATUS_RUNNING);
    assert_eq!(
        dev.status_log(),
        vec![
            0,
            VIRTIO_CONFIG_S_ACKNOWLEDGE,
            STATUS_PROBING,
            STATUS_RUNNING
        ]
    );
    assert!(dev.queue_enabled(2));
    assert_eq!(machine.zone.used_blocks(), 2);
}

/// Virtio-scsi CD-ROM discovery.
/// TestStep:
///   1. Plug a CD-ROM in at target 0.
///   2. Scan the controller.
/// Expect:
///   1. The drive is registered as optical with 2048 byte blocks.
#[test]
fn scsi_cd_discovery_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::cdrom(300))]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::Optical), 1);
    let entry = &menu.entries()[0];
    assert_eq!(entry.desc, "DVD/CD [virtio-scsi Drive QEMU QEMU CD-ROM 2.5+]");
    assert_eq!(entry.drive.blksize, 2048);
    assert_eq!(entry.drive.sectors, 300);
    assert!(entry.drive.removable);
    assert_eq!(dev.status(), STATUS_RUNNING);
}

/// A disk typed drive with 2048 byte blocks is treated as optical.
#[test]
fn scsi_hd_2048_block_test() {
    let (machine, _dev) = scsi_machine(vec![(1, ScsiTarget::disk(64).with_blksize(2048))]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::Optical), 1);
    assert!(menu.entries()[0].desc.starts_with("DVD/CD [virtio-scsi"));
}

/// Unsupported block size.
/// TestStep:
///   1. Plug in a hard disk reporting 4096 byte blocks as the only target.
///   2. Scan the controller.
/// Expect:
///   1. Nothing is registered.
///   2. The device is reset and never sees DRIVER_OK.
///   3. The drive record goes back to the zone.
#[test]
fn scsi_unsupported_blksize_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::disk(64).with_blksize(4096))]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 0);
    assert!(menu.entries().is_empty());
    assert_eq!(dev.status(), 0);
    assert_eq!(
        dev.status_log(),
        vec![0, VIRTIO_CONFIG_S_ACKNOWLEDGE, STATUS_PROBING, 0]
    );
    assert!(!dev.queue_enabled(2));
    assert_eq!(machine.zone.used_blocks(), 0);
}

/// A controller without targets is torn down.
#[test]
fn scsi_no_target_test() {
    let (machine, dev) = scsi_machine(Vec::new());
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 0);
    assert!(menu.entries().is_empty());
    assert_eq!(dev.status(), 0);
    assert_eq!(dev.requests().len(), TEST_MAX_TARGETS as usize);
    assert!(!dev.status_log().contains(&STATUS_RUNNING));
}

/// Descriptor chain shapes.
/// TestStep:
///   1. Scan a controller with one hard disk.
///   2. Write two blocks through the dispatcher.
/// Expect:
///   1. INQUIRY is [request][response][36 bytes data in].
///   2. TEST UNIT READY carries no data descriptor.
///   3. WRITE(10) is [request][1024 bytes data out][response].
#[test]
fn scsi_desc_chain_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::disk(TEST_DISK_SECTORS))]);
    let (_count, dispatch, menu) = scsi_setup(&machine, Vec::new());

    let requests = dev.requests();
    assert_eq!(
        opcodes(&dev)[..3],
        [INQUIRY, TEST_UNIT_READY, READ_CAPACITY_10]
    );
    assert_eq!(
        requests[0].chain,
        vec![(REQ_LEN, false), (RESP_LEN, true), (36, true)]
    );
    assert_eq!(requests[1].chain, vec![(REQ_LEN, false), (RESP_LEN, true)]);
    assert_eq!(
        requests[2].chain,
        vec![(REQ_LEN, false), (RESP_LEN, true), (8, true)]
    );
    assert!(requests[..3]
        .iter()
        .all(|r| r.response == VIRTIO_SCSI_S_OK && r.status == GOOD));

    dev.clear_requests();
    let drive = menu.drives(BootKind::HardDisk).next().unwrap().clone();
    let mut buf = random_blocks(2, 512);
    let mut op = DiskOp::new(&drive, 10, 2, &mut buf);
    cdb_write(&dispatch, &mut op).unwrap();

    let requests = dev.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].chain,
        vec![(REQ_LEN, false), (1024, false), (RESP_LEN, true)]
    );
}

/// Basic IO.
/// TestStep:
///   1. Scan a controller with one hard disk.
///   2. Write random data to blocks 100 to 107, then read it back.
///   3. Read the rigid disk geometry page.
/// Expect:
///   1. The device holds the written data and the read returns it.
///   2. The geometry is the one the disk reports.
#[test]
fn scsi_hd_io_test() {
    let (machine, dev) = scsi_machine(vec![(5, ScsiTarget::disk(TEST_DISK_SECTORS))]);
    let (_count, dispatch, menu) = scsi_setup(&machine, Vec::new());
    let drive = menu.drives(BootKind::HardDisk).next().unwrap().clone();

    let data = random_blocks(8, 512);
    let mut buf = data.clone();
    let mut op = DiskOp::new(&drive, 100, 8, &mut buf);
    let res = cdb_write(&dispatch, &mut op);
    assert_eq!(disk_ret(&res), DiskRet::Success);

    let target = dev.target(5).unwrap();
    for i in 0..8 {
        let start = i as usize * 512;
        assert_eq!(target.block(100 + i), &data[start..start + 512]);
    }

    let mut buf = vec![0_u8; 8 * 512];
    let mut op = DiskOp::new(&drive, 100, 8, &mut buf);
    cdb_read(&dispatch, &mut op).unwrap();
    assert_eq!(buf, data);

    let geom = cdb_mode_sense_geom(&dispatch, &drive).unwrap();
    assert_eq!(geom.page, 0x04);
    assert_eq!(geom.cylinders, 16);
    assert_eq!(geom.heads, 4);
    assert_eq!(geom.rpm, 5400);
    assert!(!geom.read_only);
}

/// Failed commands.
/// TestStep:
///   1. Read past the end of a disk.
///   2. Break the target and read a valid block.
///   3. Hand the transport a buffer smaller than the transfer.
/// Expect:
///   1. CHECK CONDITION, reported as a bad track.
///   2. VIRTIO_SCSI_S_FAILURE, reported as a bad track.
///   3. A parameter error, and nothing reaches the device.
#[test]
fn scsi_cmd_failure_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::disk(16))]);
    let (_count, dispatch, menu) = scsi_setup(&machine, Vec::new());
    let drive = menu.drives(BootKind::HardDisk).next().unwrap().clone();

    dev.clear_requests();
    let mut buf = vec![0_u8; 2 * 512];
    let mut op = DiskOp::new(&drive, 15, 2, &mut buf);
    let res = cdb_read(&dispatch, &mut op);
    assert_eq!(disk_ret(&res), DiskRet::EBadTrack);
    assert!(matches!(
        res.unwrap_err().downcast_ref::<DiskError>(),
        Some(DiskError::Transport {
            response: VIRTIO_SCSI_S_OK,
            status: CHECK_CONDITION
        })
    ));
    assert_eq!(dev.requests()[0].status, CHECK_CONDITION);

    dev.set_target_broken(0, true);
    let mut op = DiskOp::new(&drive, 0, 1, &mut buf);
    let res = cdb_read(&dispatch, &mut op);
    assert_eq!(disk_ret(&res), DiskRet::EBadTrack);
    assert!(matches!(
        res.unwrap_err().downcast_ref::<DiskError>(),
        Some(DiskError::Transport {
            response: VIRTIO_SCSI_S_FAILURE,
            ..
        })
    ));

    dev.set_target_broken(0, false);
    dev.clear_requests();
    let mut short = vec![0_u8; 512];
    let mut op = DiskOp::new(&drive, 0, 2, &mut short);
    let res = cdb_read(&dispatch, &mut op);
    assert_eq!(disk_ret(&res), DiskRet::EParam);
    assert!(dev.requests().is_empty());

    // The queue is still usable afterwards.
    let mut op = DiskOp::new(&drive, 0, 1, &mut short);
    assert!(cdb_read(&dispatch, &mut op).is_ok());
}

/// A target failing at the transport level is skipped, the others are kept.
#[test]
fn scsi_broken_target_test() {
    let (machine, dev) = scsi_machine(vec![
        (1, ScsiTarget::disk(TEST_DISK_SECTORS).broken()),
        (2, ScsiTarget::disk(TEST_DISK_SECTORS)),
    ]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::HardDisk), 1);
    let broken: Vec<_> = dev.requests().into_iter().filter(|r| r.target == 1).collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].response, VIRTIO_SCSI_S_FAILURE);
    assert_eq!(machine.zone.used_blocks(), 1);
}

/// Spinning up drive.
/// TestStep:
///   1. Plug in a disk reporting "becoming ready" to its first 3 TEST UNIT READY.
///   2. Scan the controller.
/// Expect:
///   1. The driver asks REQUEST SENSE after each failure and keeps polling.
///   2. The disk is registered once it is ready.
#[test]
fn scsi_spin_up_test() {
    let disk = ScsiTarget::disk(TEST_DISK_SECTORS).with_spin_up(3);
    let (machine, dev) = scsi_machine(vec![(0, disk)]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::HardDisk), 1);
    let ops: Vec<u8> = opcodes(&dev)
        .into_iter()
        .filter(|op| *op != INQUIRY)
        .take(8)
        .collect();
    assert_eq!(
        ops,
        vec![
            TEST_UNIT_READY,
            REQUEST_SENSE,
            TEST_UNIT_READY,
            REQUEST_SENSE,
            TEST_UNIT_READY,
            REQUEST_SENSE,
            TEST_UNIT_READY,
            READ_CAPACITY_10
        ]
    );
}

/// A disk that never finishes spinning up is given up on.
/// TestStep:
///   1. Plug in a disk that always reports "becoming ready".
///   2. Scan the controller.
/// Expect:
///   1. Polling stops once the extended deadline passes.
///   2. The disk has no usable geometry and is not registered.
#[test]
fn scsi_spin_up_timeout_test() {
    let disk = ScsiTarget::disk(TEST_DISK_SECTORS).with_spin_up(u32::MAX);
    let (machine, dev) = scsi_machine(vec![(0, disk)]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 0);
    assert!(menu.entries().is_empty());
    // 5 seconds plus a single 30 second extension.
    assert!(machine.clock.get_test_clock() >= 30_000_000);
    assert!(machine.clock.get_test_clock() < 40_000_000);
    assert!(!opcodes(&dev).contains(&READ_CAPACITY_10));
    assert_eq!(dev.status(), 0);
}

/// Drives without medium.
/// TestStep:
///   1. Plug in an empty CD-ROM at target 0 and a disk without medium at target 1.
///   2. Scan the controller.
/// Expect:
///   1. Polling stops at the first "medium not present".
///   2. The CD-ROM is still offered as optical; the disk is dropped.
#[test]
fn scsi_no_medium_test() {
    let (machine, dev) = scsi_machine(vec![
        (0, ScsiTarget::cdrom(0).without_medium()),
        (1, ScsiTarget::disk(TEST_DISK_SECTORS).without_medium()),
    ]);
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::Optical), 1);
    assert_eq!(menu.count(BootKind::HardDisk), 0);
    assert_eq!(menu.entries()[0].drive.blksize, 0);
    assert_eq!(menu.entries()[0].drive.sectors, 0);

    for target in 0..2 {
        let ops: Vec<u8> = dev
            .requests()
            .iter()
            .filter(|r| r.target == target)
            .map(|r| r.opcode)
            .collect();
        assert_eq!(ops, vec![INQUIRY, TEST_UNIT_READY, REQUEST_SENSE]);
    }
    assert!(machine.clock.get_test_clock() < 5_000_000);
}

/// Boot order.
/// TestStep:
///   1. Plug in hard disks at targets 2 and 6.
///   2. Scan with target 6 listed first in the boot order.
/// Expect:
///   1. Target 6 gets priority 0 and comes first; target 2 gets the default priority.
#[test]
fn scsi_boot_priority_test() {
    let (machine, _dev) = scsi_machine(vec![
        (2, ScsiTarget::disk(TEST_DISK_SECTORS)),
        (6, ScsiTarget::cdrom(100)),
    ]);
    let order = vec![ScsiBootPath {
        bdf: TEST_SCSI_BDF,
        target: 6,
        lun: 0,
    }];
    let (count, _dispatch, menu) = scsi_setup(&machine, order);

    assert_eq!(count, 2);
    let entries = menu.entries();
    assert_eq!(entries[0].kind, BootKind::Optical);
    assert_eq!(entries[0].prio, 0);
    assert_eq!(entries[1].kind, BootKind::HardDisk);
    assert_eq!(entries[1].prio, devices::boot::DEFAULT_PRIO);
}

/// The request queue is bigger than the driver supports.
/// TestStep:
///   1. Offer a 256 entry request queue.
///   2. Scan the controller.
/// Expect:
///   1. The controller is reset and no command is sent.
#[test]
fn scsi_queue_too_large_test() {
    let mut machine = TestStdMachine::new();
    let dev = machine.add_virtio_scsi(TEST_SCSI_BDF, TestVirtioScsi::with_queue_size(256));
    dev.add_target(0, ScsiTarget::disk(TEST_DISK_SECTORS));
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 0);
    assert!(menu.entries().is_empty());
    assert!(dev.requests().is_empty());
    assert_eq!(dev.status(), 0);
    assert_eq!(*dev.status_log().last().unwrap(), 0);
}

/// A small request queue is used as offered.
#[test]
fn scsi_small_queue_test() {
    let mut machine = TestStdMachine::new();
    let dev = machine.add_virtio_scsi(TEST_SCSI_BDF, TestVirtioScsi::with_queue_size(4));
    dev.add_target(0, ScsiTarget::disk(TEST_DISK_SECTORS));
    let (count, dispatch, menu) = scsi_setup(&machine, Vec::new());
    assert_eq!(count, 1);

    // Many more commands than descriptors: the ring wraps.
    let drive = menu.drives(BootKind::HardDisk).next().unwrap().clone();
    for lba in 0..20 {
        let mut buf = random_blocks(1, 512);
        let mut op = DiskOp::new(&drive, lba, 1, &mut buf);
        cdb_write(&dispatch, &mut op).unwrap();
    }
    assert_eq!(dev.requests().len(), TEST_MAX_TARGETS as usize + 2 + 20);
}

/// PCI function filter.
/// TestStep:
///   1. Plug in a NIC, a virtio-blk function, a virtio-scsi function without
///      registers and a working virtio-scsi controller.
///   2. Scan.
/// Expect:
///   1. Only the two virtio-scsi functions are opened.
///   2. The working controller is set up despite the other one failing.
#[test]
fn scsi_pci_filter_test() {
    let mut machine = TestStdMachine::new();
    machine.add_pci(0x08, 0x8086, 0x100e);
    machine.add_pci(0x10, PCI_VENDOR_ID_REDHAT_QUMRANET, 0x1001);
    machine.add_pci(0x18, PCI_VENDOR_ID_REDHAT_QUMRANET, PCI_DEVICE_ID_VIRTIO_SCSI);
    let dev = machine.add_virtio_scsi(TEST_SCSI_BDF, TestVirtioScsi::new());
    dev.add_target(0, ScsiTarget::disk(TEST_DISK_SECTORS));
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(machine.opened(), vec![0x18, TEST_SCSI_BDF]);
    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::HardDisk), 1);
}

/// Every controller contributes its drives to one total.
#[test]
fn scsi_multi_controller_test() {
    let mut machine = TestStdMachine::new();
    let first = machine.add_virtio_scsi(0x20, TestVirtioScsi::new());
    first.add_target(0, ScsiTarget::disk(TEST_DISK_SECTORS));
    let second = machine.add_virtio_scsi(0x30, TestVirtioScsi::new());
    second.add_target(1, ScsiTarget::cdrom(100));
    second.add_target(2, ScsiTarget::disk(TEST_DISK_SECTORS));
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 3);
    let mut ids: Vec<u32> = menu.entries().iter().map(|e| e.drive.cntl_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0x20, 0x30, 0x30]);
    assert_eq!(first.status(), STATUS_RUNNING);
    assert_eq!(second.status(), STATUS_RUNNING);
}

/// Drive records come from the zone.
/// TestStep:
///   1. Give the machine a zone too small for one drive record.
///   2. Scan a controller with a hard disk.
/// Expect:
///   1. No command is sent and the controller is torn down.
#[test]
fn scsi_zone_exhausted_test() {
    let mut machine = TestStdMachine::new_byzone(16);
    let dev = machine.add_virtio_scsi(TEST_SCSI_BDF, TestVirtioScsi::new());
    dev.add_target(0, ScsiTarget::disk(TEST_DISK_SECTORS));
    let (count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(count, 0);
    assert!(menu.entries().is_empty());
    assert!(dev.requests().is_empty());
    assert_eq!(dev.status(), 0);
}

/// Device config and interrupt status.
/// TestStep:
///   1. Scan a controller with one hard disk.
/// Expect:
///   1. The driver programmed cdb_size 32 and sense_size 96, other fields unchanged.
///   2. ISR was read after every command and nothing is left pending.
#[test]
fn scsi_device_config_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::disk(TEST_DISK_SECTORS))]);
    let (_count, _dispatch, _menu) = scsi_setup(&machine, Vec::new());

    let config = dev.config();
    let (cdb_size, sense_size) = (config.cdb_size, config.sense_size);
    let max_target = config.max_target;
    assert_eq!(cdb_size, 32);
    assert_eq!(sense_size, 96);
    assert_eq!(max_target, 255);
    assert_eq!(config.as_bytes().len(), size_of::<VirtioScsiConfig>());

    assert!(!dev.isr_pending());
    // One read at reset plus one per command.
    assert_eq!(dev.isr_reads(), 1 + dev.requests().len());
}

/// Identification strings are taken from INQUIRY.
#[test]
fn scsi_inquiry_pdt_test() {
    let mut cd = ScsiTarget::cdrom(100);
    cd.vendor = "VENDOR".to_string();
    cd.product = "OPTICAL".to_string();
    cd.rev = "1.0".to_string();
    assert_eq!(cd.pdt, TYPE_ROM);
    let (machine, _dev) = scsi_machine(vec![(4, cd)]);
    let (_count, _dispatch, menu) = scsi_setup(&machine, Vec::new());

    assert_eq!(
        menu.entries()[0].desc,
        "DVD/CD [virtio-scsi Drive VENDOR OPTICAL 1.0]"
    );
}

/// Target ids beyond the LUN address range.
/// TestStep:
///   1. Plug a hard disk in at target 0.
///   2. Scan with an upper bound of 300 targets.
/// Expect:
///   1. Only targets 0 to 255 are addressed, so the disk is registered once.
#[test]
fn scsi_target_bound_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::disk(TEST_DISK_SECTORS))]);
    let dispatch = machine.dispatcher();
    let mut menu = BootMenu::default();
    let count = {
        let mut env = machine.scan_env(&dispatch, &mut menu);
        virtio_scsi_setup(&machine.pci_devices(), |pci| machine.open(pci), 300, &mut env)
    };

    assert_eq!(count, 1);
    assert_eq!(menu.count(BootKind::HardDisk), 1);
    let inquiries: Vec<u16> = dev
        .requests()
        .iter()
        .filter(|r| r.opcode == INQUIRY)
        .map(|r| r.target)
        .collect();
    assert_eq!(inquiries, (0..256).collect::<Vec<u16>>());
}

/// A malformed completion.
/// TestStep:
///   1. Scan a controller with one hard disk.
///   2. Make the device complete the next read under an invalid head.
/// Expect:
///   1. The read fails with the invalid head.
///   2. The interrupt status is still read and nothing stays pending.
#[test]
fn scsi_bad_completion_test() {
    let (machine, dev) = scsi_machine(vec![(0, ScsiTarget::disk(TEST_DISK_SECTORS))]);
    let (_count, dispatch, menu) = scsi_setup(&machine, Vec::new());
    let drive = menu.drives(BootKind::HardDisk).next().unwrap().clone();

    dev.set_bad_completion(true);
    let isr_reads = dev.isr_reads();
    let mut buf = vec![0_u8; 512];
    let mut op = DiskOp::new(&drive, 0, 1, &mut buf);
    let err = cdb_read(&dispatch, &mut op).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<VirtioError>(),
        Some(VirtioError::InvalidHead(128))
    ));
    assert_eq!(dev.isr_reads(), isr_reads + 1);
    assert!(!dev.isr_pending());
}
