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

use std::cell::Cell;
use std::rc::Rc;

use crate::clock::TimeSource;

/// Manually driven clock for tests.
///
/// Clones share the same time line, so a test can keep one handle and pass
/// another to the code under test. `usleep` advances the clock, and an
/// optional step advances it on every read so that polling loops terminate.
#[derive(Clone, Default)]
pub struct TestClock {
    now: Rc<Cell<u64>>,
    step: Rc<Cell<u64>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `now_us` read moves time forward by `us`.
    pub fn with_step(us: u64) -> Self {
        let clock = Self::default();
        clock.step.set(us);
        clock
    }

    pub fn set_test_clock(&self, us: u64) {
        if us > self.now.get() {
            self.now.set(us);
        }
    }

    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }

    pub fn get_test_clock(&self) -> u64 {
        self.now.get()
    }
}

impl TimeSource for TestClock {
    fn now_us(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step.get());
        now
    }

    fn usleep(&self, us: u64) {
        self.advance(us);
    }
}
