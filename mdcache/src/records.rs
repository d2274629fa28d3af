// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The metadata records held by the cache manager, one type per cache category,
//! along with the size hints used to account for their variable-size payloads

use crate::cache::SizeHint;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::mem::size_of;

/// Hierarchy information of a store object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Parent object id (0 for a store root)
    pub parent: u32,
    /// Owning user id
    pub owner: u32,
    /// Object flags
    pub flags: u32,
    /// Object type (folder, message, attachment, ...)
    pub obj_type: u32,
}

impl SizeHint for ObjectRecord {}

/// The store an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Object id of the store root
    pub store_id: u32,
    /// Store GUID
    pub guid: [u8; 16],
    /// Store type (private, public, archive, ...)
    pub store_type: u32,
}

impl SizeHint for StoreRecord {}

/// One access-control grant on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Grantee id
    pub user_id: u32,
    /// Kind of grant
    pub acl_type: u32,
    /// Granted rights mask
    pub rights: u32,
}

/// All grants on an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclList(pub Vec<AclEntry>);

impl SizeHint for AclList {
    fn size_hint(&self) -> u64 {
        (self.0.len() * size_of::<AclEntry>()) as u64
    }
}

/// A property value as cached in an object's cell record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropValue {
    /// 32-bit integer
    Long(u32),
    /// 64-bit integer
    LongLong(i64),
    /// Boolean
    Bool(bool),
    /// Unicode string
    Unicode(String),
    /// Binary blob
    Binary(Vec<u8>),
}

impl SizeHint for PropValue {
    fn size_hint(&self) -> u64 {
        let heap = match self {
            Self::Unicode(text) => text.len(),
            Self::Binary(data) => data.len(),
            _ => 0,
        };
        (size_of::<Self>() + heap) as u64
    }
}

/// The cached property values of one object. A complete record holds every
/// (non-computed) property of the object, so a missing property is known absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    props: BTreeMap<u32, PropValue>,
    complete: bool,
}

impl CellRecord {
    /// Create an empty, incomplete record
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a property by tag
    pub fn get(&self, tag: u32) -> Option<&PropValue> {
        self.props.get(&tag)
    }

    /// Set (or replace) a property
    pub fn set(&mut self, tag: u32, value: PropValue) {
        self.props.insert(tag, value);
    }

    /// Add `delta` to an integer property. Properties that are absent or not
    /// integers are left alone. Returns whether a property changed.
    pub fn add_delta(&mut self, tag: u32, delta: i32) -> bool {
        match self.props.get_mut(&tag) {
            Some(PropValue::Long(value)) => {
                *value = value.wrapping_add_signed(delta);
                true
            }
            Some(PropValue::LongLong(value)) => {
                *value = value.wrapping_add(delta as i64);
                true
            }
            _ => false,
        }
    }

    /// Replace the bits selected by `mask` of a 32-bit property with those of
    /// `value`. Returns whether a property changed.
    pub fn set_masked(&mut self, tag: u32, mask: u32, value: u32) -> bool {
        match self.props.get_mut(&tag) {
            Some(PropValue::Long(current)) => {
                *current = (*current & !mask) | (value & mask);
                true
            }
            _ => false,
        }
    }

    /// Whether the record holds every property of the object
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Mark whether the record holds every property of the object
    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    /// Number of cached properties
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether no property is cached
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

impl SizeHint for CellRecord {
    fn size_hint(&self) -> u64 {
        self.props
            .values()
            .map(|value| size_of::<u32>() as u64 + value.size_hint())
            .sum()
    }
}

/// Key of the property-to-object index: a property tag with its binary value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexProp {
    /// Property id
    pub tag: u32,
    /// Property value
    pub data: Vec<u8>,
}

impl SizeHint for IndexProp {
    fn size_hint(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Key of the object-to-property index: an object with one of its indexed
/// property ids. Ordered by object first, so all tags of an object are adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexObject {
    /// Object id
    pub obj_id: u32,
    /// Property id
    pub tag: u32,
}

impl SizeHint for IndexObject {}

/// The property tags indexed for a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedProperties(pub Vec<u32>);

impl SizeHint for IndexedProperties {
    fn size_hint(&self) -> u64 {
        (self.0.len() * size_of::<u32>()) as u64
    }
}

/// A resolved user-directory object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserObject {
    /// Object class (user, group, contact, company, ...)
    pub class: u32,
    /// Id in the external user directory
    pub extern_id: Vec<u8>,
    /// Change signature reported by the external directory
    pub signature: String,
    /// Company the object belongs to
    pub company: u32,
}

impl SizeHint for UserObject {
    fn size_hint(&self) -> u64 {
        (self.extern_id.len() + self.signature.len()) as u64
    }
}

/// Key of the external-id mapping
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternId {
    /// Id in the external user directory
    pub id: Vec<u8>,
    /// Object class
    pub class: u32,
}

/// Address-book details of a user object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails(pub BTreeMap<String, String>);

impl SizeHint for UserDetails {
    fn size_hint(&self) -> u64 {
        self.0
            .iter()
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum()
    }
}

/// Connection details of a server in a multi-server installation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDetails {
    /// Host name or address
    pub host_address: String,
    /// Local socket path
    pub file_path: String,
    /// Plain HTTP endpoint
    pub http_path: String,
    /// HTTPS endpoint
    pub ssl_path: String,
}

impl SizeHint for ServerDetails {
    fn size_hint(&self) -> u64 {
        (self.host_address.len() + self.file_path.len() + self.http_path.len() + self.ssl_path.len())
            as u64
    }
}

/// Storage quota limits in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Whether the company default applies instead of these limits
    pub use_default: bool,
    /// Warning threshold
    pub warn: i64,
    /// Soft limit (no more sending)
    pub soft: i64,
    /// Hard limit (no more receiving)
    pub hard: i64,
}

impl SizeHint for Quota {}
