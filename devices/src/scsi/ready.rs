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

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::scsi::cmd::{cdb_get_sense, cdb_test_unit_ready};
use crate::scsi::dispatch::CdbDispatcher;
use crate::ScsiCdb::{SCSI_SENSE_BECOMING_READY, SCSI_SENSE_NO_MEDIUM};
use crate::{DiskError, Drive};
use util::clock::TimeSource;

/// Time a drive gets to answer TEST UNIT READY.
pub const READY_TIMEOUT_MS: u64 = 5000;
/// Extra time granted once a drive reports it is spinning up.
pub const BECOMING_READY_TIMEOUT_MS: u64 = 30000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    /// Still probing, giving up after `deadline` (microseconds).
    Polling { deadline: u64 },
    Ready,
    NotPresent,
    TimedOut,
}

/// TEST UNIT READY / REQUEST SENSE polling loop for one drive.
///
/// The "becoming ready" extension is granted once per poller; later reports
/// of the same condition do not move the deadline again.
pub struct ReadinessPoll<'a> {
    dispatch: &'a CdbDispatcher,
    drive: &'a Drive,
    clock: &'a dyn TimeSource,
    state: ReadyState,
    escalations: u32,
    polls: u32,
}

impl<'a> ReadinessPoll<'a> {
    pub fn new(dispatch: &'a CdbDispatcher, drive: &'a Drive, clock: &'a dyn TimeSource) -> Self {
        ReadinessPoll {
            dispatch,
            drive,
            clock,
            state: ReadyState::Polling {
                deadline: clock.calc_future(READY_TIMEOUT_MS),
            },
            escalations: 0,
            polls: 0,
        }
    }

    pub fn state(&self) -> ReadyState {
        self.state
    }

    /// Times the deadline was extended for a spinning up drive, at most 1.
    pub fn escalations(&self) -> u32 {
        self.escalations
    }

    /// Number of TEST UNIT READY commands issued so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Run one poll iteration and return the resulting state.
    pub fn step(&mut self) -> ReadyState {
        let deadline = match self.state {
            ReadyState::Polling { deadline } => deadline,
            done => return done,
        };

        if self.clock.check_deadline(deadline) {
            warn!("{} drive: test unit ready failed", self.drive.drive_type);
            self.state = ReadyState::TimedOut;
            return self.state;
        }

        self.polls += 1;
        if cdb_test_unit_ready(self.dispatch, self.drive).is_ok() {
            self.state = ReadyState::Ready;
            return self.state;
        }

        let sense = match cdb_get_sense(self.dispatch, self.drive) {
            Ok(sense) => sense,
            // Retry right away; the deadline bounds the loop.
            Err(_) => return self.state,
        };
        debug!(
            "{} drive not ready, sense {:x}/{:02x}/{:02x}",
            self.drive.drive_type,
            sense.key(),
            sense.asc,
            sense.ascq
        );

        if sense.is(&SCSI_SENSE_NO_MEDIUM, false) {
            info!("Device reports MEDIUM NOT PRESENT");
            self.state = ReadyState::NotPresent;
        } else if sense.is(&SCSI_SENSE_BECOMING_READY, true) && self.escalations == 0 {
            info!("Waiting for device to detect medium... ");
            self.escalations += 1;
            self.state = ReadyState::Polling {
                deadline: self.clock.calc_future(BECOMING_READY_TIMEOUT_MS),
            };
        }
        self.state
    }

    /// Poll until the drive settles into a final state.
    pub fn run(&mut self) -> ReadyState {
        loop {
            match self.step() {
                ReadyState::Polling { .. } => continue,
                done => return done,
            }
        }
    }
}

/// Wait for the drive to accept commands.
pub fn scsi_is_ready(dispatch: &CdbDispatcher, drive: &Drive, clock: &dyn TimeSource) -> Result<()> {
    debug!("scsi_is_ready (drive={:x})", drive.cntl_id);
    match ReadinessPoll::new(dispatch, drive, clock).run() {
        ReadyState::Ready => Ok(()),
        ReadyState::NotPresent => Err(anyhow!(DiskError::MediumAbsent)),
        _ => Err(anyhow!(DiskError::Timeout)),
    }
}
