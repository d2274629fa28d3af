// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Byte budgets and lifetimes of the metadata caches, named after the server
//! settings which carry them. A budget of 0 disables the category; lifetimes are
//! expressed in minutes.

use crate::errors::ConfigError;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;

const MIB: u64 = 1024 * 1024;

/// Cache sizing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Budget of the object hierarchy cache
    pub cache_object_size: u64,
    /// Budget of the store cache
    pub cache_store_size: u64,
    /// Budget of the ACL cache
    pub cache_acl_size: u64,
    /// Budget of the property cell cache
    pub cache_cell_size: u64,
    /// Budget of each of the two index caches and of the indexed property cache
    pub cache_indexedobject_size: u64,
    /// Budget of each of the two quota caches
    pub cache_quota_size: u64,
    /// Lifetime of quota entries, in minutes
    pub cache_quota_lifetime: i64,
    /// Budget of the user object and external id caches
    pub cache_user_size: u64,
    /// Budget of the user details cache
    pub cache_userdetails_size: u64,
    /// Lifetime of user object, external id and user details entries, in minutes
    pub cache_userdetails_lifetime: i64,
    /// Budget of the server details cache
    pub cache_server_size: u64,
    /// Lifetime of server details entries, in minutes
    pub cache_server_lifetime: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_object_size: 16 * MIB,
            cache_store_size: MIB,
            cache_acl_size: MIB,
            cache_cell_size: 16 * MIB,
            cache_indexedobject_size: 16 * MIB,
            cache_quota_size: MIB,
            cache_quota_lifetime: 1,
            cache_user_size: MIB,
            cache_userdetails_size: MIB,
            cache_userdetails_lifetime: 5,
            cache_server_size: MIB,
            cache_server_lifetime: 30,
        }
    }
}

impl CacheConfig {
    /// A configuration with every cache disabled (pure pass-through to the store)
    pub fn disabled() -> Self {
        Self {
            cache_object_size: 0,
            cache_store_size: 0,
            cache_acl_size: 0,
            cache_cell_size: 0,
            cache_indexedobject_size: 0,
            cache_quota_size: 0,
            cache_user_size: 0,
            cache_userdetails_size: 0,
            cache_server_size: 0,
            ..Self::default()
        }
    }

    /// Parse settings from JSON. Missing settings take their default value.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|err| ConfigError::Format(err.to_string()))
    }

    /// Load settings from a JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut contents = String::new();

        let mut file = tokio::fs::File::open(path.as_ref())
            .await
            .map_err(|err| ConfigError::File(format!("{}: {err}", path.as_ref().display())))?;

        file.read_to_string(&mut contents)
            .await
            .map_err(|err| ConfigError::File(format!("{}: {err}", path.as_ref().display())))?;

        Self::from_json(&contents)
    }

    /// Quota lifetime in seconds
    pub fn quota_lifetime_secs(&self) -> i64 {
        self.cache_quota_lifetime.saturating_mul(60)
    }

    /// User object, external id and user details lifetime in seconds
    pub fn userdetails_lifetime_secs(&self) -> i64 {
        self.cache_userdetails_lifetime.saturating_mul(60)
    }

    /// Server details lifetime in seconds
    pub fn server_lifetime_secs(&self) -> i64 {
        self.cache_server_lifetime.saturating_mul(60)
    }
}
