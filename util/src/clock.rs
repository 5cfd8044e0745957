// Copyright (c) 2023 Huawei Technologies Co.,Ltd. All rights reserved.
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

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::UtilError;

/// Monotonic time source used by the busy-wait loops of the drivers.
///
/// Deadlines are absolute microsecond values on the source's own time line.
pub trait TimeSource {
    /// Microseconds since an arbitrary, fixed origin.
    fn now_us(&self) -> u64;

    /// Wait at least `us` microseconds, giving the platform a chance to run.
    fn usleep(&self, us: u64);

    /// Returns the deadline lying `ms` milliseconds in the future.
    fn calc_future(&self, ms: u64) -> u64 {
        self.now_us().saturating_add(ms.saturating_mul(1000))
    }

    /// Returns true once `end` is strictly in the past.
    fn check_deadline(&self, end: u64) -> bool {
        self.now_us() > end
    }
}

/// Time source backed by the host monotonic clock.
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn usleep(&self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }
}

/// Time source backed by a free-running counter of known frequency,
/// like the time stamp counter firmware calibrates at start of day.
pub struct CounterClock<F: Fn() -> u64> {
    read_counter: F,
    khz: u64,
}

impl<F: Fn() -> u64> CounterClock<F> {
    pub fn new(read_counter: F, khz: u64) -> Result<Self> {
        if khz == 0 {
            return Err(anyhow!(UtilError::ClockFrequency(khz)));
        }
        Ok(Self { read_counter, khz })
    }
}

impl<F: Fn() -> u64> TimeSource for CounterClock<F> {
    fn now_us(&self) -> u64 {
        let ticks = u128::from((self.read_counter)());
        (ticks * 1000 / u128::from(self.khz)) as u64
    }

    fn usleep(&self, us: u64) {
        let end = self.now_us().saturating_add(us);
        while self.now_us() < end {
            std::hint::spin_loop();
        }
    }
}
