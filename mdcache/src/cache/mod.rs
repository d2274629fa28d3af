// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! This module implements a size-budgeted metadata cache with optional time-based
//! expiry. One instance is created per metadata category and lives for the life of
//! the process; it is emptied, never rebuilt, on an administrative purge.
//!
//! An instance runs in one of two modes:
//! - **size-LRU** (`max_age == 0`): entries never expire, a hit refreshes the entry's
//!   access time, and inserting a fresh key over budget evicts the oldest 5% of the
//!   entries.
//! - **expiring** (`max_age > 0`): entries are stamped when written and never
//!   refreshed by reads. The first lookup that finds an aged entry sweeps every
//!   aged entry out of the cache and reports a miss.
//!
//! The cache is not internally synchronized. Every mutating call takes `&mut self`,
//! so the caller must hold exclusive access (e.g. a mutex guard) for the duration of
//! each operation, including the sweeps an operation may trigger.

use crate::clock::{Clock, ProcessClock, Timestamp};
use crate::errors::CacheError;

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Bytes charged once per instance, regardless of the number of entries
pub const FIXED_OVERHEAD: u64 = 64;
/// Fraction of the entries evicted when a fresh insert takes the cache over budget
pub const DEFAULT_PURGE_RATIO: f32 = 0.05;

/// Estimate of the variable-size payload a cached value carries beyond its fixed
/// in-memory footprint (heap buffers, strings, arrays). Value types without such a
/// payload use the default of zero.
pub trait SizeHint {
    /// Additional bytes to account for this value
    fn size_hint(&self) -> u64 {
        0
    }
}

macro_rules! fixed_size_hint {
    ( $( $t:ty ),* ) => {
        $( impl SizeHint for $t {} )*
    };
}

fixed_size_hint!(u8, u16, u32, u64, i8, i16, i32, i64, bool, ());

impl SizeHint for String {
    fn size_hint(&self) -> u64 {
        self.len() as u64
    }
}

impl SizeHint for Vec<u8> {
    fn size_hint(&self) -> u64 {
        self.len() as u64
    }
}

struct CachedItem<V> {
    value: V,
    last_access: Timestamp,
}

/// The result of an insertion. A disabled cache accepts every insert and keeps
/// nothing, so callers must not assume presence after inserting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStatus {
    /// A new entry was added (and the eviction sweep may have run)
    Inserted,
    /// An existing entry's value was replaced in place
    Replaced,
    /// The cache has a zero byte budget, nothing was stored
    Disabled,
}

/// A point-in-time snapshot of a cache's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Diagnostic name of the cache
    pub name: String,
    /// Number of entries
    pub items: u64,
    /// Estimated size in bytes
    pub size: u64,
    /// Byte budget
    pub max_size: u64,
    /// Expiry window in seconds (0 = never expires)
    pub max_age: i64,
    /// Total number of lookups
    pub hits: u64,
    /// Lookups which returned a usable value
    pub valid: u64,
}

impl CacheStats {
    /// Fraction of lookups that returned a usable value
    pub fn hit_ratio(&self) -> f64 {
        if self.hits == 0 {
            0.0
        } else {
            self.valid as f64 / self.hits as f64
        }
    }
}

/// A named, bounded, ordered key-value cache. See the module documentation for
/// the eviction and expiry rules.
pub struct Cache<K, V> {
    name: String,
    max_size: u64,
    max_age: i64,
    map: BTreeMap<K, CachedItem<V>>,
    tracked_bytes: u64,
    lookup_count: u64,
    valid_count: u64,
    clock: Arc<dyn Clock>,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("items", &self.map.len())
            .field("tracked_bytes", &self.tracked_bytes)
            .field("max_size", &self.max_size)
            .field("max_age", &self.max_age)
            .field("hits", &self.lookup_count)
            .field("valid", &self.valid_count)
            .finish()
    }
}

impl<K: Ord + Clone, V: SizeHint> Cache<K, V> {
    /// Bytes charged per entry, modelling the cost of one map node. This is an
    /// approximate budget signal, not a memory measurement.
    pub const ENTRY_OVERHEAD: u64 = std::mem::size_of::<(K, CachedItem<V>)>() as u64;

    /// Create a new cache stamped by the process clock. A `max_size` of 0 disables
    /// the cache; a `max_age` of 0 selects size-LRU mode.
    pub fn new(name: &str, max_size: u64, max_age: i64) -> Self {
        Self::with_clock(name, max_size, max_age, Arc::new(ProcessClock))
    }

    /// Create a new cache stamped by the supplied clock
    pub fn with_clock(name: &str, max_size: u64, max_age: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.to_string(),
            max_size,
            max_age,
            map: BTreeMap::new(),
            tracked_bytes: 0,
            lookup_count: 0,
            valid_count: 0,
            clock,
        }
    }

    /// Put an item into the cache.
    ///
    /// Only a fresh key can trigger the eviction sweep; replacing the value of an
    /// existing key never does, so a cache dominated by updates may sit above its
    /// budget until the next fresh insert.
    pub fn insert(&mut self, key: K, value: V) -> InsertStatus {
        if self.max_size == 0 {
            return InsertStatus::Disabled;
        }

        let now = self.clock.now();
        let status = match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                let item = occupied.get_mut();
                let delta = value.size_hint() as i64 - item.value.size_hint() as i64;
                self.tracked_bytes = self.tracked_bytes.saturating_add_signed(delta);
                item.value = value;
                item.last_access = now;
                InsertStatus::Replaced
            }
            Entry::Vacant(vacant) => {
                self.tracked_bytes = self.tracked_bytes.saturating_add(value.size_hint());
                vacant.insert(CachedItem {
                    value,
                    last_access: now,
                });
                InsertStatus::Inserted
            }
        };

        if status == InsertStatus::Inserted && self.size() > self.max_size {
            self.evict_ratio(DEFAULT_PURGE_RATIO);
        }
        status
    }

    /// Perform a hit-test of the cache for a given key
    pub fn lookup(&mut self, key: &K) -> Result<&V, CacheError> {
        self.lookup_mut(key).map(|value| &*value)
    }

    /// Perform a hit-test of the cache, handing out the cached value for in-place
    /// modification. If the modification changes the value's size hint, report the
    /// difference with [`Cache::adjust_tracked_size`].
    pub fn lookup_mut(&mut self, key: &K) -> Result<&mut V, CacheError> {
        self.lookup_count += 1;

        let now = self.clock.now();
        let expiring = self.max_age > 0;

        let expired = match self.map.get(key) {
            Some(item) => expiring && now - item.last_access >= self.max_age,
            None => return Err(CacheError::NotFound),
        };
        if expired {
            self.expire(now);
            return Err(CacheError::NotFound);
        }

        match self.map.get_mut(key) {
            Some(item) => {
                // expiring caches keep the write time so nothing outlives max_age
                if !expiring {
                    item.last_access = now;
                }
                self.valid_count += 1;
                Ok(&mut item.value)
            }
            None => Err(CacheError::NotFound),
        }
    }

    /// Read an entry without counting a lookup, refreshing its access time or
    /// checking its age. Meant for bookkeeping by the owner of the cache, not for
    /// serving reads.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|item| &item.value)
    }

    /// Remove an item from the cache
    pub fn remove(&mut self, key: &K) -> Result<(), CacheError> {
        let item = self.map.remove(key).ok_or(CacheError::NotFound)?;
        self.tracked_bytes = self.tracked_bytes.saturating_sub(item.value.size_hint());
        Ok(())
    }

    /// Iterate over every entry with a key in `[lower, upper)`, in key order. Entries
    /// are returned as stored: no expiry check is made and access times and counters
    /// are left untouched.
    pub fn range(
        &self,
        lower: &K,
        upper: &K,
    ) -> Result<impl Iterator<Item = (&K, &V)> + '_, CacheError> {
        if lower > upper {
            return Err(CacheError::InvalidRange);
        }
        Ok(self
            .map
            .range((Bound::Included(lower), Bound::Excluded(upper)))
            .map(|(key, item)| (key, &item.value)))
    }

    /// Correct the tracked payload size after a caller has modified a cached value
    /// in place
    pub fn adjust_tracked_size(&mut self, delta: i64) {
        self.tracked_bytes = self.tracked_bytes.saturating_add_signed(delta);
    }

    /// Take back one valid lookup, for a caller that found a reported hit unusable.
    ///
    /// The caller must have observed at least one valid lookup since the last clear.
    /// Breaking that contract trips a debug assertion; release builds leave the
    /// counter at zero.
    pub fn decrement_valid_count(&mut self) {
        debug_assert!(
            self.valid_count >= 1,
            "valid count of cache {} decremented below zero",
            self.name
        );
        self.valid_count = self.valid_count.saturating_sub(1);
    }

    /// Drop all entries and reset the counters
    pub fn clear_cache(&mut self) {
        debug!("Clearing cache {} ({} items)", self.name, self.map.len());
        self.map.clear();
        self.tracked_bytes = 0;
        self.lookup_count = 0;
        self.valid_count = 0;
    }

    /// Evict the `ratio` fraction (rounded down) of the entries with the oldest
    /// access times. Returns the number of entries removed.
    pub fn evict_ratio(&mut self, ratio: f32) -> usize {
        let num_evict = (self.map.len() as f64 * ratio as f64) as usize;
        if num_evict == 0 {
            return 0;
        }

        // sort_by_key is stable, so ties on access time keep key order
        let mut keys_and_access = self
            .map
            .iter()
            .map(|(key, item)| (key.clone(), item.last_access))
            .collect::<Vec<_>>();
        keys_and_access.sort_by_key(|(_, last_access)| *last_access);

        let mut released = 0u64;
        for (key, _) in keys_and_access.into_iter().take(num_evict) {
            if let Some(item) = self.map.remove(&key) {
                released += item.value.size_hint();
            }
        }
        self.tracked_bytes = self.tracked_bytes.saturating_sub(released);

        debug!(
            "Evicted {} entries from cache {}, {} bytes remain of {}",
            num_evict,
            self.name,
            self.size(),
            self.max_size
        );
        num_evict
    }

    fn expire(&mut self, now: Timestamp) {
        let max_age = self.max_age;
        let mut released = 0u64;
        let before = self.map.len();
        self.map.retain(|_, item| {
            if now - item.last_access >= max_age {
                released += item.value.size_hint();
                false
            } else {
                true
            }
        });
        self.tracked_bytes = self.tracked_bytes.saturating_sub(released);
        debug!(
            "Expired {} entries from cache {}",
            before - self.map.len(),
            self.name
        );
    }

    /// Diagnostic name of the cache
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries currently held
    pub fn item_count(&self) -> u64 {
        self.map.len() as u64
    }

    /// Estimated size of the cache in bytes
    pub fn size(&self) -> u64 {
        self.item_count()
            .saturating_mul(Self::ENTRY_OVERHEAD)
            .saturating_add(FIXED_OVERHEAD)
            .saturating_add(self.tracked_bytes)
    }

    /// The byte budget
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// The expiry window in seconds, 0 if entries never expire
    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    /// Number of lookups since the last clear
    pub fn hit_count(&self) -> u64 {
        self.lookup_count
    }

    /// Number of lookups which returned a value since the last clear
    pub fn valid_count(&self) -> u64 {
        self.valid_count
    }

    /// Snapshot the cache's counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            items: self.item_count(),
            size: self.size(),
            max_size: self.max_size,
            max_age: self.max_age,
            hits: self.lookup_count,
            valid: self.valid_count,
        }
    }

    /// Hand the cache's counters to a statistics sink as `(key, description, value)`
    /// triples
    pub fn request_stats<F>(&self, mut callback: F)
    where
        F: FnMut(&str, &str, &str),
    {
        let counters = [
            ("items", "items", self.item_count()),
            ("size", "size", self.size()),
            ("maxsz", "maximum size", self.max_size),
            ("req", "requests", self.lookup_count),
            ("hit", "hits", self.valid_count),
        ];
        for (suffix, description, value) in counters {
            callback(
                &format!("cache_{}_{}", self.name, suffix),
                &format!("Cache {} {}", self.name, description),
                &value.to_string(),
            );
        }
    }

    /// Log the cache's counters at the given level
    pub fn dump_stats(&self, level: log::Level) {
        let stats = self.stats();
        let msg = format!(
            "Cache {}: {} items, {} of {} bytes, {} of {} lookups valid ({:.1}%)",
            stats.name,
            stats.items,
            stats.size,
            stats.max_size,
            stats.valid,
            stats.hits,
            stats.hit_ratio() * 100.0
        );

        match level {
            log::Level::Trace => trace!("{}", msg),
            log::Level::Debug => debug!("{}", msg),
            log::Level::Info => info!("{}", msg),
            log::Level::Warn => warn!("{}", msg),
            _ => error!("{}", msg),
        }
    }
}
