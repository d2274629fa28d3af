// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Coarse, second-resolution process clock used to stamp cache entries

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static EPOCH: OnceCell<Instant> = OnceCell::new();

/// Seconds on a process-local timeline
pub type Timestamp = i64;

/// A source of entry timestamps
pub trait Clock: Send + Sync {
    /// The current time, in whole seconds
    fn now(&self) -> Timestamp;
}

/// Seconds elapsed since the first time any cache read the process clock.
/// Monotonic, unaffected by wall-clock adjustments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessClock;

impl Clock for ProcessClock {
    fn now(&self) -> Timestamp {
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_secs() as Timestamp
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a manual clock starting at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::Relaxed);
    }

    /// Move the clock forward by `seconds`
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::Relaxed)
    }
}
