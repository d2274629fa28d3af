// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Errors for cache, administration and configuration operations.
use core::fmt;

/// Symbolizes an MdCacheError, thrown by the cache manager and its collaborators.
#[derive(Debug, PartialEq, Eq)]
pub enum MdCacheError {
    /// Error propagation
    Cache(CacheError),
    /// Error propagation
    Admin(AdminError),
    /// Error propagation
    Config(ConfigError),
}

impl From<CacheError> for MdCacheError {
    fn from(error: CacheError) -> Self {
        Self::Cache(error)
    }
}

impl From<AdminError> for MdCacheError {
    fn from(error: AdminError) -> Self {
        Self::Admin(error)
    }
}

impl From<ConfigError> for MdCacheError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl std::error::Error for MdCacheError {}

impl fmt::Display for MdCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache(err) => write!(f, "Cache error: {err}"),
            Self::Admin(err) => write!(f, "Administration error: {err}"),
            Self::Config(err) => write!(f, "Configuration error: {err}"),
        }
    }
}

/// Errors reported by a single cache instance. A miss is expected and frequent,
/// callers treat it as "refetch from the backing store".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The key is absent, or its entry has expired
    NotFound,
    /// A range query was issued with a lower bound greater than the upper bound
    InvalidRange,
}

impl std::error::Error for CacheError {}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "item not found in cache"),
            Self::InvalidRange => write!(f, "range lower bound is greater than the upper bound"),
        }
    }
}

/// Errors raised while validating an administrative request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// A cache category name in a purge list was not recognized
    UnknownCache(String),
    /// The purge list did not name any cache
    NoCacheSelected,
}

impl std::error::Error for AdminError {}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCache(name) => write!(f, "Unknown cache: \"{name}\""),
            Self::NoCacheSelected => {
                write!(f, "No caches were selected, nothing will be done")
            }
        }
    }
}

/// Errors raised while loading the cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read
    File(String),
    /// The configuration file is not valid
    Format(String),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(error_string) => write!(f, "unable to read settings: {error_string}"),
            Self::Format(error_string) => write!(f, "malformed settings: {error_string}"),
        }
    }
}
