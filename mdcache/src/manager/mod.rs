// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The cache manager owns one cache per metadata category and is the only component
//! touching them. Caches are grouped behind a few locks, and every cache operation
//! runs with its group's lock held, including any eviction or expiry sweep the
//! operation triggers. The two index caches always change together, so they share
//! a lock.

use crate::cache::{Cache, CacheStats, SizeHint};
use crate::clock::{Clock, ProcessClock};
use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::purge::PurgeFlags;
use crate::records::*;

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;


struct GeneralCaches {
    objects: Cache<u32, ObjectRecord>,
    stores: Cache<u32, StoreRecord>,
    acls: Cache<u32, AclList>,
    quota: Cache<u32, Quota>,
    quota_default: Cache<u32, Quota>,
    extern_ids: Cache<ExternId, u32>,
    user_objects: Cache<u32, UserObject>,
    user_details: Cache<u32, UserDetails>,
    servers: Cache<String, ServerDetails>,
}

struct CellCache {
    cache: Cache<u32, CellRecord>,
    disabled: bool,
}

struct IndexCaches {
    prop_to_object: Cache<IndexProp, IndexObject>,
    object_to_prop: Cache<IndexObject, IndexProp>,
}

impl IndexCaches {
    /// Drop the pair an object/tag belongs to. The reverse entry is only dropped
    /// when it still points back at `object`.
    fn remove_object(&mut self, object: &IndexObject) -> bool {
        let prop = match self.object_to_prop.peek(object) {
            Some(prop) => prop.clone(),
            None => return false,
        };
        if self.prop_to_object.peek(&prop) == Some(object) {
            let _ = self.prop_to_object.remove(&prop);
        }
        self.object_to_prop.remove(object).is_ok()
    }

    /// Drop the pair a property value belongs to. The reverse entry is only
    /// dropped when it still points back at `prop`.
    fn remove_prop(&mut self, prop: &IndexProp) -> bool {
        let object = match self.prop_to_object.peek(prop) {
            Some(object) => *object,
            None => return false,
        };
        if self.object_to_prop.peek(&object) == Some(prop) {
            let _ = self.object_to_prop.remove(&object);
        }
        self.prop_to_object.remove(prop).is_ok()
    }
}

/// A change notification for a store object, used to invalidate what the
/// caches hold about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectEvent {
    /// The object's properties or permissions changed
    Modified,
    /// The object was deleted
    Deleted,
    /// The object was moved to another folder or store
    Moved,
}

/// Represents the manager of the metadata caches
pub struct CacheManager {
    general: Mutex<GeneralCaches>,
    cells: Mutex<CellCache>,
    index: Mutex<IndexCaches>,
    indexed_properties: Mutex<Cache<u32, IndexedProperties>>,
}

impl CacheManager {
    /// Create the caches sized by the given settings
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(ProcessClock))
    }

    /// Create the caches sized by the given settings, stamping entries with `clock`
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let quota_age = config.quota_lifetime_secs();
        let user_age = config.userdetails_lifetime_secs();
        let server_age = config.server_lifetime_secs();

        fn cache<K: Ord + Clone, V: SizeHint>(
            name: &str,
            max_size: u64,
            max_age: i64,
            clock: &Arc<dyn Clock>,
        ) -> Cache<K, V> {
            Cache::with_clock(name, max_size, max_age, clock.clone())
        }

        let general = GeneralCaches {
            objects: cache("obj", config.cache_object_size, 0, &clock),
            stores: cache("store", config.cache_store_size, 0, &clock),
            acls: cache("acl", config.cache_acl_size, 0, &clock),
            quota: cache("quota", config.cache_quota_size, quota_age, &clock),
            quota_default: cache("uquota", config.cache_quota_size, quota_age, &clock),
            extern_ids: cache("extern", config.cache_user_size, user_age, &clock),
            user_objects: cache("userid", config.cache_user_size, user_age, &clock),
            user_details: cache("abinfo", config.cache_userdetails_size, user_age, &clock),
            servers: cache("server", config.cache_server_size, server_age, &clock),
        };
        let cells = CellCache {
            cache: cache("cell", config.cache_cell_size, 0, &clock),
            disabled: false,
        };
        let index = IndexCaches {
            prop_to_object: cache("index1", config.cache_indexedobject_size, 0, &clock),
            object_to_prop: cache("index2", config.cache_indexedobject_size, 0, &clock),
        };
        let indexed_properties = cache("indexedprop", config.cache_indexedobject_size, 0, &clock);

        info!(
            "Created metadata caches (object: {} bytes, cell: {} bytes, index: {} bytes)",
            config.cache_object_size, config.cache_cell_size, config.cache_indexedobject_size
        );

        Self {
            general: Mutex::new(general),
            cells: Mutex::new(cells),
            index: Mutex::new(index),
            indexed_properties: Mutex::new(indexed_properties),
        }
    }

    /// Clear every cache selected by `flags`
    pub async fn purge(&self, flags: PurgeFlags) {
        debug!("BEGIN cache purge ({})", flags);
        {
            let mut guard = self.general.lock().await;
            if flags.contains(PurgeFlags::QUOTA) {
                guard.quota.clear_cache();
            }
            if flags.contains(PurgeFlags::QUOTADEFAULT) {
                guard.quota_default.clear_cache();
            }
            if flags.contains(PurgeFlags::OBJECTS) {
                guard.objects.clear_cache();
            }
            if flags.contains(PurgeFlags::STORES) {
                guard.stores.clear_cache();
            }
            if flags.contains(PurgeFlags::ACL) {
                guard.acls.clear_cache();
            }
            if flags.contains(PurgeFlags::USEROBJECT) {
                guard.user_objects.clear_cache();
            }
            if flags.contains(PurgeFlags::EXTERNID) {
                guard.extern_ids.clear_cache();
            }
            if flags.contains(PurgeFlags::USERDETAILS) {
                guard.user_details.clear_cache();
            }
            if flags.contains(PurgeFlags::SERVER) {
                guard.servers.clear_cache();
            }
        }
        if flags.contains(PurgeFlags::CELL) {
            self.cells.lock().await.cache.clear_cache();
        }
        {
            let mut guard = self.index.lock().await;
            if flags.contains(PurgeFlags::INDEX1) {
                guard.prop_to_object.clear_cache();
            }
            if flags.contains(PurgeFlags::INDEX2) {
                guard.object_to_prop.clear_cache();
            }
        }
        if flags.contains(PurgeFlags::INDEXEDPROPERTIES) {
            self.indexed_properties.lock().await.clear_cache();
        }
        debug!("END cache purge");
    }

    /// Invalidate what the caches hold about an object after a change
    /// notification
    pub async fn update(&self, event: ObjectEvent, obj_id: u32) {
        debug!("Invalidating object {} ({:?})", obj_id, event);
        {
            let mut guard = self.general.lock().await;
            let _ = guard.objects.remove(&obj_id);
            match event {
                ObjectEvent::Modified => {
                    let _ = guard.acls.remove(&obj_id);
                }
                ObjectEvent::Deleted => {
                    let _ = guard.stores.remove(&obj_id);
                    let _ = guard.acls.remove(&obj_id);
                }
                ObjectEvent::Moved => {
                    let _ = guard.stores.remove(&obj_id);
                }
            }
        }
        let _ = self.cells.lock().await.cache.remove(&obj_id);
    }

    // ==== Objects, stores and ACLs ==== //

    /// Retrieve an object's hierarchy record
    pub async fn get_object(&self, obj_id: u32) -> Result<ObjectRecord, CacheError> {
        self.general.lock().await.objects.lookup(&obj_id).copied()
    }

    /// Cache an object's hierarchy record
    pub async fn set_object(&self, obj_id: u32, record: ObjectRecord) {
        self.general.lock().await.objects.insert(obj_id, record);
    }

    /// Forget an object's hierarchy record
    pub async fn remove_object(&self, obj_id: u32) -> Result<(), CacheError> {
        self.general.lock().await.objects.remove(&obj_id)
    }

    /// Retrieve the store an object lives in
    pub async fn get_store(&self, obj_id: u32) -> Result<StoreRecord, CacheError> {
        self.general.lock().await.stores.lookup(&obj_id).copied()
    }

    /// Cache the store an object lives in
    pub async fn set_store(&self, obj_id: u32, record: StoreRecord) {
        self.general.lock().await.stores.insert(obj_id, record);
    }

    /// Forget the store an object lives in
    pub async fn remove_store(&self, obj_id: u32) -> Result<(), CacheError> {
        self.general.lock().await.stores.remove(&obj_id)
    }

    /// Retrieve the grants on an object
    pub async fn get_acls(&self, obj_id: u32) -> Result<AclList, CacheError> {
        self.general.lock().await.acls.lookup(&obj_id).cloned()
    }

    /// Cache the grants on an object
    pub async fn set_acls(&self, obj_id: u32, acls: AclList) {
        self.general.lock().await.acls.insert(obj_id, acls);
    }

    /// Forget the grants on an object
    pub async fn remove_acls(&self, obj_id: u32) -> Result<(), CacheError> {
        self.general.lock().await.acls.remove(&obj_id)
    }

    // ==== Quota ==== //

    /// Retrieve a user's quota, or the default quota applying to the user
    pub async fn get_quota(&self, user_id: u32, is_default: bool) -> Result<Quota, CacheError> {
        let mut guard = self.general.lock().await;
        if is_default {
            guard.quota_default.lookup(&user_id).copied()
        } else {
            guard.quota.lookup(&user_id).copied()
        }
    }

    /// Cache a user's quota, or the default quota applying to the user
    pub async fn set_quota(&self, user_id: u32, is_default: bool, quota: Quota) {
        let mut guard = self.general.lock().await;
        if is_default {
            guard.quota_default.insert(user_id, quota);
        } else {
            guard.quota.insert(user_id, quota);
        }
    }

    /// Forget a user's quota, or the default quota applying to the user
    pub async fn remove_quota(&self, user_id: u32, is_default: bool) -> Result<(), CacheError> {
        let mut guard = self.general.lock().await;
        if is_default {
            guard.quota_default.remove(&user_id)
        } else {
            guard.quota.remove(&user_id)
        }
    }

    // ==== Users and servers ==== //

    /// Retrieve a resolved user object
    pub async fn get_user_object(&self, user_id: u32) -> Result<UserObject, CacheError> {
        self.general.lock().await.user_objects.lookup(&user_id).cloned()
    }

    /// Cache a resolved user object along with its external id mapping
    pub async fn set_user_object(&self, user_id: u32, object: UserObject) {
        let mut guard = self.general.lock().await;
        let extern_id = ExternId {
            id: object.extern_id.clone(),
            class: object.class,
        };
        guard.extern_ids.insert(extern_id, user_id);
        guard.user_objects.insert(user_id, object);
    }

    /// Forget a user object and its external id mapping
    pub async fn remove_user_object(&self, user_id: u32) -> Result<(), CacheError> {
        let mut guard = self.general.lock().await;
        let extern_id = guard.user_objects.peek(&user_id).map(|object| ExternId {
            id: object.extern_id.clone(),
            class: object.class,
        });
        if let Some(extern_id) = extern_id {
            let _ = guard.extern_ids.remove(&extern_id);
        }
        guard.user_objects.remove(&user_id)
    }

    /// Forget everything cached about a user: the user object and its external
    /// id mapping, address-book details and both quotas
    pub async fn update_user(&self, user_id: u32) {
        let mut guard = self.general.lock().await;
        let extern_id = guard.user_objects.peek(&user_id).map(|object| ExternId {
            id: object.extern_id.clone(),
            class: object.class,
        });
        if let Some(extern_id) = extern_id {
            let _ = guard.extern_ids.remove(&extern_id);
        }
        let _ = guard.user_objects.remove(&user_id);
        let _ = guard.user_details.remove(&user_id);
        let _ = guard.quota.remove(&user_id);
        let _ = guard.quota_default.remove(&user_id);
    }

    /// Resolve an external directory id to a local user id
    pub async fn get_user_by_extern_id(&self, extern_id: &ExternId) -> Result<u32, CacheError> {
        self.general.lock().await.extern_ids.lookup(extern_id).copied()
    }

    /// Cache an external directory id mapping
    pub async fn set_extern_id(&self, extern_id: ExternId, user_id: u32) {
        self.general.lock().await.extern_ids.insert(extern_id, user_id);
    }

    /// Forget an external directory id mapping
    pub async fn remove_extern_id(&self, extern_id: &ExternId) -> Result<(), CacheError> {
        self.general.lock().await.extern_ids.remove(extern_id)
    }

    /// Retrieve a user's address-book details
    pub async fn get_user_details(&self, user_id: u32) -> Result<UserDetails, CacheError> {
        self.general.lock().await.user_details.lookup(&user_id).cloned()
    }

    /// Cache a user's address-book details
    pub async fn set_user_details(&self, user_id: u32, details: UserDetails) {
        self.general.lock().await.user_details.insert(user_id, details);
    }

    /// Forget a user's address-book details
    pub async fn remove_user_details(&self, user_id: u32) -> Result<(), CacheError> {
        self.general.lock().await.user_details.remove(&user_id)
    }

    /// Retrieve a server's details. Server names are case-insensitive.
    pub async fn get_server_details(&self, server: &str) -> Result<ServerDetails, CacheError> {
        let key = server.to_lowercase();
        self.general.lock().await.servers.lookup(&key).cloned()
    }

    /// Cache a server's details
    pub async fn set_server_details(&self, server: &str, details: ServerDetails) {
        let key = server.to_lowercase();
        self.general.lock().await.servers.insert(key, details);
    }

    /// Forget a server's details
    pub async fn remove_server_details(&self, server: &str) -> Result<(), CacheError> {
        let key = server.to_lowercase();
        self.general.lock().await.servers.remove(&key)
    }

    // ==== Property cells ==== //

    /// Retrieve a cached property of an object.
    ///
    /// Returns `Ok(Some(value))` when cached, and `Ok(None)` when the object's record
    /// is complete and the (non-computed) property is therefore known not to exist.
    /// Otherwise nothing is known about the property, the lookup is not counted as
    /// valid, and `NotFound` is returned.
    pub async fn get_cell(
        &self,
        obj_id: u32,
        tag: u32,
        computed: bool,
    ) -> Result<Option<PropValue>, CacheError> {
        let mut guard = self.cells.lock().await;
        if guard.disabled {
            return Err(CacheError::NotFound);
        }

        let known = {
            let record = guard.cache.lookup(&obj_id)?;
            match record.get(tag) {
                Some(value) => Some(Some(value.clone())),
                None if record.is_complete() && !computed => Some(None),
                None => None,
            }
        };
        match known {
            Some(value) => Ok(value),
            None => {
                guard.cache.decrement_valid_count();
                Err(CacheError::NotFound)
            }
        }
    }

    /// Cache a property of an object, updating its record in place when present
    pub async fn set_cell(&self, obj_id: u32, tag: u32, value: PropValue) {
        let mut guard = self.cells.lock().await;
        if let Ok(record) = guard.cache.lookup_mut(&obj_id) {
            let before = record.size_hint() as i64;
            record.set(tag, value);
            let delta = record.size_hint() as i64 - before;
            guard.cache.adjust_tracked_size(delta);
        } else {
            let mut record = CellRecord::new();
            record.set(tag, value);
            guard.cache.insert(obj_id, record);
        }
    }

    /// Add `delta` to a cached integer property of an object. `NotFound` when
    /// the object has no cached record; an uncached property is left alone.
    pub async fn update_cell_delta(
        &self,
        obj_id: u32,
        tag: u32,
        delta: i32,
    ) -> Result<(), CacheError> {
        let mut guard = self.cells.lock().await;
        guard.cache.lookup_mut(&obj_id)?.add_delta(tag, delta);
        Ok(())
    }

    /// Replace the bits selected by `mask` of a cached 32-bit property of an
    /// object. `NotFound` when the object has no cached record.
    pub async fn update_cell_masked(
        &self,
        obj_id: u32,
        tag: u32,
        mask: u32,
        value: u32,
    ) -> Result<(), CacheError> {
        let mut guard = self.cells.lock().await;
        guard.cache.lookup_mut(&obj_id)?.set_masked(tag, mask, value);
        Ok(())
    }

    /// Mark an object's cached record as holding all of its properties
    pub async fn set_complete(&self, obj_id: u32) -> Result<(), CacheError> {
        let mut guard = self.cells.lock().await;
        guard.cache.lookup_mut(&obj_id)?.set_complete(true);
        Ok(())
    }

    /// Forget all cached properties of an object
    pub async fn remove_cell(&self, obj_id: u32) -> Result<(), CacheError> {
        self.cells.lock().await.cache.remove(&obj_id)
    }

    /// Stop answering cell lookups from the cache (e.g. while a bulk update runs)
    pub async fn disable_cell_cache(&self) {
        debug!("Disabling cell cache");
        self.cells.lock().await.disabled = true;
    }

    /// Resume answering cell lookups from the cache
    pub async fn enable_cell_cache(&self) {
        debug!("Enabling cell cache");
        self.cells.lock().await.disabled = false;
    }

    // ==== Property indexes ==== //

    /// Cache the mapping between an object and the value of one of its indexed
    /// properties, in both directions. Any pair previously holding the object's
    /// tag or the value is dropped first.
    pub async fn set_index_data(&self, obj_id: u32, tag: u32, data: Vec<u8>) {
        let object = IndexObject { obj_id, tag };
        let prop = IndexProp { tag, data };

        let mut guard = self.index.lock().await;
        guard.remove_object(&object);
        guard.remove_prop(&prop);
        guard.prop_to_object.insert(prop.clone(), object);
        guard.object_to_prop.insert(object, prop);
    }

    /// Resolve an indexed property value to the object carrying it
    pub async fn get_object_from_prop(&self, tag: u32, data: &[u8]) -> Result<u32, CacheError> {
        let prop = IndexProp {
            tag,
            data: data.to_vec(),
        };
        let mut guard = self.index.lock().await;
        guard
            .prop_to_object
            .lookup(&prop)
            .map(|object| object.obj_id)
    }

    /// Retrieve the value of an object's indexed property
    pub async fn get_prop_from_object(&self, obj_id: u32, tag: u32) -> Result<Vec<u8>, CacheError> {
        let mut guard = self.index.lock().await;
        guard
            .object_to_prop
            .lookup(&IndexObject { obj_id, tag })
            .map(|prop| prop.data.clone())
    }

    /// Forget every indexed property of an object. Returns the number of
    /// properties removed.
    pub async fn remove_index_data(&self, obj_id: u32) -> Result<usize, CacheError> {
        let lower = IndexObject { obj_id, tag: 0 };
        let upper = match obj_id.checked_add(1) {
            Some(next) => IndexObject {
                obj_id: next,
                tag: 0,
            },
            None => IndexObject {
                obj_id,
                tag: u32::MAX,
            },
        };

        let mut guard = self.index.lock().await;
        let items = guard
            .object_to_prop
            .range(&lower, &upper)?
            .map(|(object, prop)| (*object, prop.clone()))
            .collect::<Vec<_>>();

        for (object, prop) in items.iter() {
            let _ = guard.object_to_prop.remove(object);
            let _ = guard.prop_to_object.remove(prop);
        }
        Ok(items.len())
    }

    /// Forget one indexed property of an object, in both directions
    pub async fn remove_index_object(&self, obj_id: u32, tag: u32) -> Result<(), CacheError> {
        let mut guard = self.index.lock().await;
        if guard.remove_object(&IndexObject { obj_id, tag }) {
            Ok(())
        } else {
            Err(CacheError::NotFound)
        }
    }

    /// Forget an indexed property value, in both directions
    pub async fn remove_index_prop(&self, tag: u32, data: &[u8]) -> Result<(), CacheError> {
        let prop = IndexProp {
            tag,
            data: data.to_vec(),
        };
        let mut guard = self.index.lock().await;
        if guard.remove_prop(&prop) {
            Ok(())
        } else {
            Err(CacheError::NotFound)
        }
    }

    /// Retrieve the property tags indexed for a store
    pub async fn get_indexed_properties(
        &self,
        store_id: u32,
    ) -> Result<IndexedProperties, CacheError> {
        self.indexed_properties.lock().await.lookup(&store_id).cloned()
    }

    /// Cache the property tags indexed for a store
    pub async fn set_indexed_properties(&self, store_id: u32, tags: IndexedProperties) {
        self.indexed_properties.lock().await.insert(store_id, tags);
    }

    /// Forget the property tags indexed for a store
    pub async fn remove_indexed_properties(&self, store_id: u32) -> Result<(), CacheError> {
        self.indexed_properties.lock().await.remove(&store_id)
    }

    // ==== Statistics ==== //

    /// Snapshot the counters of every cache
    pub async fn collect_stats(&self) -> Vec<CacheStats> {
        let mut stats = vec![];
        {
            let guard = self.general.lock().await;
            stats.push(guard.objects.stats());
            stats.push(guard.stores.stats());
            stats.push(guard.acls.stats());
            stats.push(guard.quota.stats());
            stats.push(guard.quota_default.stats());
            stats.push(guard.extern_ids.stats());
            stats.push(guard.user_objects.stats());
            stats.push(guard.user_details.stats());
            stats.push(guard.servers.stats());
        }
        stats.push(self.cells.lock().await.cache.stats());
        {
            let guard = self.index.lock().await;
            stats.push(guard.prop_to_object.stats());
            stats.push(guard.object_to_prop.stats());
        }
        stats.push(self.indexed_properties.lock().await.stats());
        stats
    }

    /// Hand the counters of every cache to a statistics sink as
    /// `(key, description, value)` triples
    pub async fn request_stats<F>(&self, mut callback: F)
    where
        F: FnMut(&str, &str, &str),
    {
        {
            let guard = self.general.lock().await;
            guard.objects.request_stats(&mut callback);
            guard.stores.request_stats(&mut callback);
            guard.acls.request_stats(&mut callback);
            guard.quota.request_stats(&mut callback);
            guard.quota_default.request_stats(&mut callback);
            guard.extern_ids.request_stats(&mut callback);
            guard.user_objects.request_stats(&mut callback);
            guard.user_details.request_stats(&mut callback);
            guard.servers.request_stats(&mut callback);
        }
        self.cells.lock().await.cache.request_stats(&mut callback);
        {
            let guard = self.index.lock().await;
            guard.prop_to_object.request_stats(&mut callback);
            guard.object_to_prop.request_stats(&mut callback);
        }
        self.indexed_properties
            .lock()
            .await
            .request_stats(&mut callback);
    }

    /// Log the counters of every cache at the given level
    pub async fn dump_stats(&self, level: log::Level) {
        log::log!(level, "Dumping cache stats:");
        {
            let guard = self.general.lock().await;
            guard.objects.dump_stats(level);
            guard.stores.dump_stats(level);
            guard.acls.dump_stats(level);
            guard.quota.dump_stats(level);
            guard.quota_default.dump_stats(level);
            guard.extern_ids.dump_stats(level);
            guard.user_objects.dump_stats(level);
            guard.user_details.dump_stats(level);
            guard.servers.dump_stats(level);
        }
        self.cells.lock().await.cache.dump_stats(level);
        {
            let guard = self.index.lock().await;
            guard.prop_to_object.dump_stats(level);
            guard.object_to_prop.dump_stats(level);
        }
        self.indexed_properties.lock().await.dump_stats(level);
    }
}
