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

use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{Level, Log, Metadata, Record};

use crate::UtilError;

/// Format like "[%file: %line]:%level: %message"
struct ConsoleLogger {
    console: Mutex<Box<dyn Write + Send>>,
    level: Level,
}

fn format_record(record: &Record) -> String {
    format!(
        "[{}: {}]:{}: {}\n",
        record.file().unwrap_or(""),
        record.line().unwrap_or(0),
        record.level(),
        record.args()
    )
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let formatmsg = format_record(record);
        let mut console = match self.console.lock() {
            Ok(c) => c,
            Err(_) => return,
        };
        if let Err(e) = console.write_all(formatmsg.as_bytes()) {
            eprintln!("Failed to log message {:?}", e);
        }
    }

    fn flush(&self) {
        if let Ok(mut console) = self.console.lock() {
            let _ = console.flush();
        }
    }
}

/// Map a firmware debug level to a log level.
///
/// Level 0 keeps only errors, 1 is the usual boot chatter, 3 adds the
/// per-command traces and 6 or more logs everything.
pub fn level_from_debug(debug_level: u8) -> Level {
    match debug_level {
        0 => Level::Error,
        1 => Level::Info,
        2..=5 => Level::Debug,
        _ => Level::Trace,
    }
}

/// Install the console logger once for the whole process.
///
/// # Arguments
///
/// * `console` - The debug console the lines are written to.
/// * `level` - The most verbose level emitted.
pub fn init_log(console: Box<dyn Write + Send>, level: Level) -> Result<()> {
    let logger = ConsoleLogger {
        console: Mutex::new(console),
        level,
    };
    log::set_boxed_logger(Box::new(logger))
        .map(|()| log::set_max_level(level.to_level_filter()))
        .map_err(UtilError::SetLogger)
        .with_context(|| "Failed to init logger")
}
