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

use std::cell::RefCell;
use std::mem::size_of;
use std::ptr::{addr_of, read_volatile};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use byteorder::{BigEndian, ByteOrder};
use log::{debug, error, info, warn};

use super::scsi_lun::{virtio_scsi_scan_target, ScsiScanEnv, VirtioLunCtx};
use crate::queue::DescEntry;
use crate::transport::virtio_pci::{vp_find_vq, PciDevice, VirtioPciOps};
use crate::{PCI_DEVICE_ID_VIRTIO_SCSI, PCI_VENDOR_ID_REDHAT_QUMRANET};
use devices::ScsiCdb::{CommandBlock, GOOD, SCSI_CMD_BUF_SIZE};
use devices::{CdbBackend, DiskError, DiskOp};
use util::byte_code::ByteCode;
use util::clock::TimeSource;

/// Size of the cdb and sense data fields the driver asks the device to use.
pub const VIRTIO_SCSI_CDB_SIZE: usize = 32;
pub const VIRTIO_SCSI_SENSE_SIZE: usize = 96;

/// Queue 0 is control and queue 1 is event; commands go to the first request queue.
pub const VIRTIO_SCSI_REQUEST_QUEUE: u16 = 2;

/// Targets scanned when the configuration gives no bound.
pub const VIRTIO_SCSI_MAX_TARGET: u16 = 256;

/// Command-specific response values.
/// The request was completed and the status byte if filled with a SCSI status code.
pub const VIRTIO_SCSI_S_OK: u8 = 0;
/// If the content of the CDB(such as the allocation length, parameter length or transfer size)
/// requires more data than is available in the datain and dataout buffers.
pub const VIRTIO_SCSI_S_OVERRUN: u8 = 1;
/// The request was never processed because the target indicated by lun does not exist.
pub const VIRTIO_SCSI_S_BAD_TARGET: u8 = 3;
/// Other host or driver error.
pub const VIRTIO_SCSI_S_FAILURE: u8 = 9;

/// Microseconds to yield between polls of the used ring.
const POLL_INTERVAL_US: u64 = 5;

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default)]
pub struct VirtioScsiConfig {
    pub num_queues: u32,
    pub seg_max: u32,
    pub max_sectors: u32,
    pub cmd_per_lun: u32,
    pub event_info_size: u32,
    pub sense_size: u32,
    pub cdb_size: u32,
    pub max_channel: u16,
    pub max_target: u16,
    pub max_lun: u32,
}

impl ByteCode for VirtioScsiConfig {}

/// Request header of a virtio-scsi command.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default)]
pub struct VirtioScsiCmdReq {
    /// Logical Unit Number.
    pub lun: [u8; 8],
    /// Command identifier.
    pub tag: u64,
    /// Task attribute.
    pub task_attr: u8,
    /// SAM command priority field.
    pub prio: u8,
    pub crn: u8,
    pub cdb: [u8; VIRTIO_SCSI_CDB_SIZE],
}

impl ByteCode for VirtioScsiCmdReq {}

/// Response header of a virtio-scsi command.
#[repr(C, packed)]
#[derive(Copy, Clone)]
pub struct VirtioScsiCmdResp {
    /// Sense data length.
    pub sense_len: u32,
    /// Residual bytes in data buffer.
    pub resid: u32,
    /// Status qualifier.
    pub status_qualifier: u16,
    /// Command completion status.
    pub status: u8,
    /// Response value.
    pub response: u8,
    /// Sense buffer data.
    pub sense: [u8; VIRTIO_SCSI_SENSE_SIZE],
}

impl Default for VirtioScsiCmdResp {
    fn default() -> Self {
        VirtioScsiCmdResp {
            sense_len: 0,
            resid: 0,
            status_qualifier: 0,
            status: 0,
            response: 0,
            sense: [0; VIRTIO_SCSI_SENSE_SIZE],
        }
    }
}

impl ByteCode for VirtioScsiCmdResp {}

/// Single level LUN address of `target`/`lun` on bus 0.
pub fn scsi_lun_bytes(target: u16, lun: u16) -> [u8; 8] {
    let mut addr = [0_u8; 8];
    addr[0] = 1;
    addr[1] = target as u8;
    // Flat space addressing method.
    BigEndian::write_u16(&mut addr[2..4], lun | 0x4000);
    addr
}

/// Lay out a command's buffers, device readable ones first.
///
/// Reads become [request][response][data] and writes [request][data][response].
/// An empty data buffer is left out.
pub fn build_sg_list(
    req: &VirtioScsiCmdReq,
    resp: &mut VirtioScsiCmdResp,
    data: &mut [u8],
    datain: bool,
) -> Vec<DescEntry> {
    let resp_entry = DescEntry {
        addr: resp as *mut VirtioScsiCmdResp as u64,
        len: size_of::<VirtioScsiCmdResp>() as u32,
        write: true,
    };
    let data_entry = (!data.is_empty()).then(|| DescEntry {
        addr: data.as_mut_ptr() as u64,
        len: data.len() as u32,
        write: datain,
    });

    let mut sg = vec![DescEntry::from_slice(req.as_bytes(), false)];
    if datain {
        sg.push(resp_entry);
        sg.extend(data_entry);
    } else {
        sg.extend(data_entry);
        sg.push(resp_entry);
    }
    sg
}

/// Send one command block to a LUN and wait for its completion.
///
/// # Arguments
///
/// * `ctx` - The LUN, its controller and request queue.
/// * `clock` - Time source yielding while the device works.
/// * `op` - Operation owning the data buffer.
/// * `cdb` - The command block.
/// * `len` - Bytes to transfer, at most the size of `op.buf`.
pub fn virtio_scsi_cmd(
    ctx: &VirtioLunCtx,
    clock: &dyn TimeSource,
    op: &mut DiskOp,
    cdb: &CommandBlock,
    len: usize,
) -> Result<()> {
    if op.buf.len() < len {
        return Err(anyhow!(DiskError::Parameter(format!(
            "buffer of {} bytes for a {} byte transfer",
            op.buf.len(),
            len
        ))));
    }

    let mut req = VirtioScsiCmdReq {
        lun: scsi_lun_bytes(ctx.target, ctx.lun),
        ..Default::default()
    };
    req.cdb[..SCSI_CMD_BUF_SIZE].copy_from_slice(cdb.as_bytes());
    let mut resp = VirtioScsiCmdResp::default();
    let sg = build_sg_list(&req, &mut resp, &mut op.buf[..len], !cdb.is_write());

    let completed = {
        let mut vq = ctx.vq.borrow_mut();
        vq.add_chained(&sg)?;
        vq.kick(ctx.ops.as_ref());
        while !vq.more_used() {
            clock.usleep(POLL_INTERVAL_US);
        }
        vq.get_buf()
    };
    // Interrupts are not used, but drop any the device raised anyway.
    ctx.ops.get_isr();
    completed?;

    // SAFETY: resp is a live local the device filled in through the ring.
    let resp = unsafe { read_volatile(addr_of!(resp)) };
    let (response, status) = (resp.response, resp.status);
    if response == VIRTIO_SCSI_S_OK && status == GOOD {
        return Ok(());
    }
    Err(anyhow!(DiskError::Transport { response, status }))
}

/// Carries command blocks for `DriveType::VirtioScsi` drives.
pub struct VirtioScsiBackend {
    clock: Rc<dyn TimeSource>,
}

impl VirtioScsiBackend {
    pub fn new(clock: Rc<dyn TimeSource>) -> Self {
        VirtioScsiBackend { clock }
    }
}

impl CdbBackend for VirtioScsiBackend {
    fn cmd_data(&self, op: &mut DiskOp, cdb: &CommandBlock, blocksize: u16) -> Result<()> {
        let drive = op.drive;
        let ctx = drive.context::<VirtioLunCtx>().ok_or_else(|| {
            anyhow!(DiskError::Parameter(
                "drive carries no virtio-scsi lun".to_string()
            ))
        })?;
        let len = blocksize as usize * op.count as usize;
        virtio_scsi_cmd(ctx, self.clock.as_ref(), op, cdb, len)
    }
}

/// Bring up one controller and register the LUNs found behind it.
///
/// Returns the number of targets that produced a bootable drive. With none,
/// the device is reset and left without DRIVER_OK.
///
/// # Arguments
///
/// * `pci` - The controller's PCI function.
/// * `ops` - Its register interface.
/// * `max_targets` - Targets 0 to `max_targets - 1` are scanned, never beyond 255.
/// * `env` - Dispatcher, clock, record zone and boot registry.
pub fn init_virtio_scsi(
    pci: &PciDevice,
    ops: Rc<dyn VirtioPciOps>,
    max_targets: u16,
    env: &mut ScsiScanEnv,
) -> Result<usize> {
    info!(
        "found virtio-scsi at {:02x}:{:02x}.{}",
        pci.bus(),
        pci.dev(),
        pci.func()
    );
    ops.start();

    let vq = match vp_find_vq(ops.as_ref(), VIRTIO_SCSI_REQUEST_QUEUE) {
        Ok(vq) => Rc::new(RefCell::new(vq)),
        Err(e) => {
            error!(
                "fail to find vq for virtio-scsi {:02x}:{:02x}",
                pci.bus(),
                pci.dev()
            );
            ops.reset();
            return Err(e);
        }
    };

    let mut cfg_buf = [0_u8; size_of::<VirtioScsiConfig>()];
    ops.config_read(0, &mut cfg_buf);
    let mut cfg = VirtioScsiConfig::from_bytes(&cfg_buf)
        .with_context(|| format!("virtio-scsi {:?}: bad config space", pci))?;
    cfg.cdb_size = VIRTIO_SCSI_CDB_SIZE as u32;
    cfg.sense_size = VIRTIO_SCSI_SENSE_SIZE as u32;
    ops.config_write(0, cfg.as_bytes());

    let mut count = 0;
    // The LUN address has a single byte for the target.
    for target in 0..max_targets.min(VIRTIO_SCSI_MAX_TARGET) {
        match virtio_scsi_scan_target(pci, &ops, &vq, target, env) {
            Ok(()) => count += 1,
            Err(e) => debug!("virtio-scsi {:?} target {}: {:#}", pci, target, e),
        }
    }

    if count == 0 {
        // The device must forget the ring before it is freed.
        ops.reset();
        drop(vq);
        info!("virtio-scsi {:?}: no usable targets", pci);
        return Ok(0);
    }
    ops.set_driver_ok();
    Ok(count)
}

/// Initialize every virtio-scsi controller among `devs`.
///
/// Returns the number of bootable drives registered. Failures of one
/// controller are logged and do not affect the others.
///
/// # Arguments
///
/// * `devs` - PCI functions found by the bus scan.
/// * `open` - Maps a function to its register interface.
/// * `max_targets` - Targets scanned on each controller.
/// * `env` - Dispatcher, clock, record zone and boot registry.
pub fn virtio_scsi_setup<F>(
    devs: &[PciDevice],
    open: F,
    max_targets: u16,
    env: &mut ScsiScanEnv,
) -> usize
where
    F: Fn(&PciDevice) -> Result<Rc<dyn VirtioPciOps>>,
{
    debug!("init virtio-scsi");
    let mut total = 0;
    for pci in devs.iter().filter(|d| {
        d.vendor_id == PCI_VENDOR_ID_REDHAT_QUMRANET && d.device_id == PCI_DEVICE_ID_VIRTIO_SCSI
    }) {
        let ops = match open(pci) {
            Ok(ops) => ops,
            Err(e) => {
                warn!("virtio-scsi {:?}: cannot map registers: {:?}", pci, e);
                continue;
            }
        };
        match init_virtio_scsi(pci, ops, max_targets, env) {
            Ok(count) => total += count,
            Err(e) => warn!("virtio-scsi {:?}: {:?}", pci, e),
        }
    }
    total
}
