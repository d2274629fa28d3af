// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Utilities shared by the tests of this crate and of crates embedding the cache
//! manager: a colored console logger and small cache configurations

use crate::config::CacheConfig;

use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::OnceCell;
use std::sync::Once;
use std::time::Instant;

static START: OnceCell<Instant> = OnceCell::new();
static LOGGER: TestConsoleLogger = TestConsoleLogger {};
static INIT_ONCE: Once = Once::new();

pub(crate) struct TestConsoleLogger;

impl TestConsoleLogger {
    fn render(record: &Record) -> String {
        let elapsed = START.get().map(|start| start.elapsed()).unwrap_or_default();
        let location = match (record.module_path(), record.line()) {
            (Some(module), Some(line)) => format!(" ({module}:{line})"),
            (Some(module), None) => format!(" ({module})"),
            _ => String::new(),
        };
        format!(
            "[{:>4}.{:03}s] {:5} {}{}",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
            record.level(),
            record.args(),
            location
        )
    }
}

impl log::Log for TestConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::render(record);
        let line = match record.level() {
            Level::Trace | Level::Debug => line.white(),
            Level::Info => line.blue(),
            Level::Warn => line.yellow(),
            Level::Error => line.red(),
        };
        println!("{line}");
    }

    fn flush(&self) {}
}

/// Install the console logger. Only the first call takes effect, so the level of
/// the first caller wins for the whole test binary.
pub fn init_logger(level: Level) {
    START.get_or_init(Instant::now);

    INIT_ONCE.call_once(|| {
        // another logger may already be installed by the embedding crate
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level.to_level_filter());
        }
    });
}

/// A configuration where every cache has the same (small) byte budget
pub fn uniform_config(max_size: u64) -> CacheConfig {
    CacheConfig {
        cache_object_size: max_size,
        cache_store_size: max_size,
        cache_acl_size: max_size,
        cache_cell_size: max_size,
        cache_indexedobject_size: max_size,
        cache_quota_size: max_size,
        cache_user_size: max_size,
        cache_userdetails_size: max_size,
        cache_server_size: max_size,
        ..CacheConfig::default()
    }
}

#[cfg(test)]
#[ctor::ctor]
fn test_start() {
    init_logger(Level::Info);
}
