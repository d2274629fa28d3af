// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::OnceCell;
use std::io::Write;
use std::time::Instant;

static EPOCH: OnceCell<Instant> = OnceCell::new();

pub(crate) struct ConsoleLogger {
    pub(crate) level: Level,
    pub(crate) no_color: bool,
}

impl ConsoleLogger {
    pub(crate) fn touch() {
        EPOCH.get_or_init(Instant::now);
    }

    /// Install a console logger as the global logger
    pub(crate) fn init(level: Level, no_color: bool) -> Result<(), log::SetLoggerError> {
        Self::touch();
        log::set_boxed_logger(Box::new(Self { level, no_color }))
            .map(|()| log::set_max_level(level.to_level_filter()))
    }

    pub(crate) fn format_log_record(io: &mut (dyn Write + Send), record: &Record, no_color: bool) {
        let target = match (record.target().split("::").last(), record.line()) {
            (Some(target), Some(line)) => format!(" ({target}:{line})"),
            (Some(target), None) => format!(" ({target})"),
            _ => String::new(),
        };

        let toc = EPOCH.get().map(|epoch| epoch.elapsed()).unwrap_or_default();
        let seconds = toc.as_secs();
        let msg = format!(
            "[{:02}:{:02}:{:02}.{:03}] {:6} {}{}",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60,
            toc.subsec_millis(),
            record.level(),
            record.args(),
            target
        );
        if no_color {
            let _ = writeln!(io, "{msg}");
        } else {
            let msg = match record.level() {
                Level::Trace | Level::Debug => msg.white(),
                Level::Info => msg.blue(),
                Level::Warn => msg.yellow(),
                Level::Error => msg.red(),
            };
            let _ = writeln!(io, "{msg}");
        }
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut io = std::io::stderr();
        ConsoleLogger::format_log_record(&mut io, record, self.no_color);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
