// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Bounded, size-budgeted in-memory caches for the metadata a groupware storage
//! server reads over and over from its database.
//!
//! # Overview
//! The server keeps one cache per kind of metadata (object hierarchy, stores, ACLs,
//! property cells, property indexes, quotas, users, servers). Each cache is a
//! [`Cache`], an ordered key-value map with a byte budget and, optionally, a
//! lifetime for its entries.
//!
//! ### Modes
//! - **Non-expiring** caches (`max_age == 0`) act as approximate LRU caches: every hit
//! refreshes the entry, and when an insertion pushes the cache over its budget, the
//! 5% least recently accessed entries are evicted.
//! - **Expiring** caches (`max_age > 0`) keep entries for a fixed time after they were
//! written. Hits do not extend an entry's life, and the first lookup that finds an
//! expired entry sweeps every expired entry from the cache.
//!
//! A budget of `0` disables a cache: every insertion is ignored and every lookup misses.
//!
//! ### Accounting
//! A cache's [size](Cache::size) is `items * ENTRY_OVERHEAD + FIXED_OVERHEAD + tracked_bytes`,
//! where `tracked_bytes` is the sum of the [`SizeHint`]s of the stored values, i.e. of
//! their variable-size payloads.
//!
//! ### Manager
//! The [`CacheManager`] owns every cache, serializes access to them behind a few async
//! locks, and exposes typed operations per category along with administrative purges
//! ([`PurgeFlags`]) and statistics.
//!
//! ```
//! use mdcache::{CacheConfig, CacheManager, PurgeFlags};
//! use mdcache::records::ObjectRecord;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(async {
//!     let manager = CacheManager::new(&CacheConfig::default());
//!     let record = ObjectRecord { parent: 1, owner: 2, flags: 0, obj_type: 3 };
//!     manager.set_object(42, record).await;
//!     assert_eq!(Ok(record), manager.get_object(42).await);
//!
//!     manager.purge(PurgeFlags::parse("object").unwrap()).await;
//!     assert!(manager.get_object(42).await.is_err());
//! });
//! ```

#![warn(missing_docs)]
#![allow(clippy::multiple_crate_versions)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod manager;
pub mod purge;
pub mod records;

#[cfg(any(test, feature = "public_tests"))]
pub mod test_utils;

pub use cache::{Cache, CacheStats, InsertStatus, SizeHint};
pub use clock::{Clock, ManualClock, ProcessClock};
pub use config::CacheConfig;
pub use errors::{AdminError, CacheError, ConfigError, MdCacheError};
pub use manager::{CacheManager, ObjectEvent};
pub use purge::PurgeFlags;
