// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Selection of the caches an administrative purge clears

use crate::errors::AdminError;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of cache categories to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PurgeFlags(u32);

impl PurgeFlags {
    /// Per-user quota cache
    pub const QUOTA: Self = Self(0x0001);
    /// Per-user default quota cache
    pub const QUOTADEFAULT: Self = Self(0x0002);
    /// Object hierarchy cache
    pub const OBJECTS: Self = Self(0x0004);
    /// Store cache
    pub const STORES: Self = Self(0x0008);
    /// ACL cache
    pub const ACL: Self = Self(0x0010);
    /// Property cell cache
    pub const CELL: Self = Self(0x0020);
    /// Property-to-object index cache
    pub const INDEX1: Self = Self(0x0040);
    /// Object-to-property index cache
    pub const INDEX2: Self = Self(0x0080);
    /// Indexed property list cache
    pub const INDEXEDPROPERTIES: Self = Self(0x0100);
    /// User object cache
    pub const USEROBJECT: Self = Self(0x0200);
    /// External id mapping cache
    pub const EXTERNID: Self = Self(0x0400);
    /// User details cache
    pub const USERDETAILS: Self = Self(0x0800);
    /// Server details cache
    pub const SERVER: Self = Self(0x1000);
    /// Every cache
    pub const ALL: Self = Self(0xFFFF_FFFF);

    /// The administrative name of each category, as accepted by [`PurgeFlags::parse`]
    pub const NAMES: [(&'static str, PurgeFlags); 14] = [
        ("all", Self::ALL),
        ("quota", Self::QUOTA),
        ("quotadefault", Self::QUOTADEFAULT),
        ("object", Self::OBJECTS),
        ("store", Self::STORES),
        ("acl", Self::ACL),
        ("cell", Self::CELL),
        ("index1", Self::INDEX1),
        ("index2", Self::INDEX2),
        ("indexedproperty", Self::INDEXEDPROPERTIES),
        ("userobject", Self::USEROBJECT),
        ("externid", Self::EXTERNID),
        ("userdetail", Self::USERDETAILS),
        ("server", Self::SERVER),
    ];

    /// No category selected
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The raw bit representation
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every category in `other` is selected
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no category is selected
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Look up a single category by its administrative name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, flags)| *flags)
    }

    /// Parse a comma-separated list of category names (or `all`). Any unknown name
    /// rejects the whole request.
    pub fn parse(list: &str) -> Result<Self, AdminError> {
        if list.trim().is_empty() {
            return Err(AdminError::NoCacheSelected);
        }

        let mut flags = Self::empty();
        for token in list.split(',') {
            match Self::from_name(token) {
                Some(selected) => flags |= selected,
                None => return Err(AdminError::UnknownCache(token.trim().to_string())),
            }
        }
        Ok(flags)
    }
}

impl BitOr for PurgeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PurgeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PurgeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return write!(f, "all");
        }
        let names = Self::NAMES
            .iter()
            .skip(1)
            .filter(|(_, flags)| self.contains(*flags))
            .map(|(name, _)| *name)
            .collect::<Vec<_>>();
        write!(f, "{}", names.join(","))
    }
}
