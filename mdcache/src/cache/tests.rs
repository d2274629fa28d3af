// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Caching tests

use super::*;
use crate::clock::ManualClock;

type StringCache = Cache<u32, String>;

fn string_cache(max_size: u64, max_age: i64) -> (StringCache, ManualClock) {
    let clock = ManualClock::new(0);
    let cache = Cache::with_clock("test", max_size, max_age, Arc::new(clock.clone()));
    (cache, clock)
}

fn expected_size(cache: &StringCache, payload_bytes: u64) -> u64 {
    cache.item_count() * StringCache::ENTRY_OVERHEAD + FIXED_OVERHEAD + payload_bytes
}

#[test]
fn test_disabled_cache_holds_nothing() {
    let (mut cache, clock) = string_cache(0, 0);

    for i in 0..100 {
        assert_eq!(InsertStatus::Disabled, cache.insert(i, format!("value {i}")));
        clock.advance(1);
    }
    assert_eq!(0, cache.item_count());
    assert_eq!(FIXED_OVERHEAD, cache.size());

    for i in 0..100 {
        assert_eq!(Err(CacheError::NotFound), cache.lookup(&i));
    }
    assert_eq!(100, cache.hit_count());
    assert_eq!(0, cache.valid_count());
}

#[test]
fn test_cache_put_and_read_back() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    assert_eq!(
        InsertStatus::Inserted,
        cache.insert(7, "some value".to_string())
    );
    assert_eq!(Ok(&"some value".to_string()), cache.lookup(&7));
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&8));
}

#[test]
fn test_size_accounting() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);
    assert_eq!(FIXED_OVERHEAD, cache.size());

    cache.insert(1, "a".repeat(10));
    cache.insert(2, "b".repeat(20));
    cache.insert(3, "c".repeat(30));
    assert_eq!(expected_size(&cache, 60), cache.size());

    // overwrite with a shorter and then a longer value
    assert_eq!(InsertStatus::Replaced, cache.insert(2, "b".repeat(5)));
    assert_eq!(expected_size(&cache, 45), cache.size());
    assert_eq!(InsertStatus::Replaced, cache.insert(2, "b".repeat(50)));
    assert_eq!(expected_size(&cache, 90), cache.size());

    assert_eq!(Ok(()), cache.remove(&1));
    assert_eq!(2, cache.item_count());
    assert_eq!(expected_size(&cache, 80), cache.size());

    assert_eq!(Err(CacheError::NotFound), cache.remove(&1));
    assert_eq!(expected_size(&cache, 80), cache.size());
}

#[test]
fn test_cache_put_and_expires() {
    let (mut cache, clock) = string_cache(1024 * 1024, 5);

    cache.insert(1, "some value".to_string());
    clock.set(3);
    assert_eq!(Ok(&"some value".to_string()), cache.lookup(&1));

    clock.set(10);
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&1));
    assert_eq!(0, cache.item_count());
    assert_eq!(expected_size(&cache, 0), cache.size());
}

#[test]
fn test_expiry_sweeps_co_expired_entries() {
    let (mut cache, clock) = string_cache(1024 * 1024, 5);

    cache.insert(1, "one".to_string());
    cache.insert(2, "two".to_string());
    clock.set(8);
    cache.insert(3, "three".to_string());

    // a fresh entry does not trigger the sweep, even with aged entries around
    clock.set(10);
    assert!(cache.lookup(&3).is_ok());
    assert_eq!(3, cache.item_count());

    // tripping over one aged entry removes every aged entry
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&2));
    assert_eq!(1, cache.item_count());
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&1));
    assert_eq!(expected_size(&cache, 5), cache.size());
}

#[test]
fn test_expiring_lookup_does_not_extend_life() {
    let (mut cache, clock) = string_cache(1024 * 1024, 5);

    cache.insert(1, "value".to_string());
    for now in 1..5 {
        clock.set(now);
        assert!(cache.lookup(&1).is_ok());
    }
    clock.set(5);
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&1));
}

#[test]
fn test_expiring_overwrite_restarts_life() {
    let (mut cache, clock) = string_cache(1024 * 1024, 5);

    cache.insert(1, "value".to_string());
    clock.set(4);
    assert_eq!(InsertStatus::Replaced, cache.insert(1, "newer".to_string()));
    clock.set(8);
    assert_eq!(Ok(&"newer".to_string()), cache.lookup(&1));
}

#[test]
fn test_lru_eviction_order() {
    let (mut cache, clock) = string_cache(1024 * 1024, 0);

    clock.set(1);
    cache.insert(1, "A".to_string());
    clock.set(2);
    cache.insert(2, "B".to_string());
    clock.set(3);
    cache.insert(3, "C".to_string());

    // refresh A, which makes B the oldest
    clock.set(4);
    assert!(cache.lookup(&1).is_ok());

    assert_eq!(1, cache.evict_ratio(0.34));
    assert_eq!(2, cache.item_count());
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&2));
    assert!(cache.lookup(&1).is_ok());
    assert!(cache.lookup(&3).is_ok());
    assert_eq!(expected_size(&cache, 2), cache.size());
}

#[test]
fn test_eviction_ties_keep_key_order() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    for key in [40, 10, 30, 20] {
        cache.insert(key, String::new());
    }
    assert_eq!(2, cache.evict_ratio(0.5));
    assert_eq!(
        vec![30, 40],
        cache.range(&0, &100).unwrap().map(|(k, _)| *k).collect::<Vec<_>>()
    );
}

#[test]
fn test_small_ratio_on_small_cache_evicts_nothing() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    for key in 0..19 {
        cache.insert(key, String::new());
    }
    assert_eq!(0, cache.evict_ratio(DEFAULT_PURGE_RATIO));
    assert_eq!(19, cache.item_count());
}

#[test]
fn test_cache_memory_pressure() {
    let clock = ManualClock::new(0);
    let max_size = FIXED_OVERHEAD + 40 * Cache::<u32, u32>::ENTRY_OVERHEAD;
    let mut cache: Cache<u32, u32> =
        Cache::with_clock("pressure", max_size, 0, Arc::new(clock.clone()));

    for key in 0..40 {
        clock.set(key as i64);
        cache.insert(key, key);
    }
    // exactly at budget is not over budget
    assert_eq!(40, cache.item_count());
    assert_eq!(max_size, cache.size());

    clock.set(40);
    cache.insert(40, 40);
    // floor(41 * 5%) = 2 of the oldest entries are gone
    assert_eq!(39, cache.item_count());
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&0));
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&1));
    assert_eq!(Ok(&2), cache.lookup(&2));
    assert_eq!(Ok(&40), cache.lookup(&40));
}

#[test]
fn test_overwrite_does_not_sweep() {
    let max_size = FIXED_OVERHEAD + 20 * StringCache::ENTRY_OVERHEAD + 20;
    let (mut cache, clock) = string_cache(max_size, 0);

    for key in 0..20 {
        clock.set(key as i64);
        cache.insert(key, "x".to_string());
    }
    assert_eq!(max_size, cache.size());

    clock.set(50);
    assert_eq!(InsertStatus::Replaced, cache.insert(5, "x".repeat(10)));
    assert_eq!(20, cache.item_count());
    assert!(cache.size() > cache.max_size());

    // the next fresh insert sweeps, taking out the oldest entry
    clock.set(60);
    assert_eq!(InsertStatus::Inserted, cache.insert(100, "x".to_string()));
    assert_eq!(20, cache.item_count());
    assert_eq!(Err(CacheError::NotFound), cache.lookup(&0));
    assert!(cache.lookup(&5).is_ok());
}

#[test]
fn test_range_query() {
    let (mut cache, clock) = string_cache(1024 * 1024, 5);

    for key in [15, 1, 10, 5] {
        cache.insert(key, format!("value {key}"));
    }
    // range ignores expiry state and leaves the counters alone
    clock.set(100);
    let got = cache
        .range(&4, &11)
        .expect("Valid range")
        .map(|(k, v)| (*k, v.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        vec![(5, "value 5".to_string()), (10, "value 10".to_string())],
        got
    );
    assert_eq!(0, cache.hit_count());
    assert_eq!(4, cache.item_count());

    // the upper bound is exclusive
    assert_eq!(1, cache.range(&10, &15).unwrap().count());
    assert_eq!(0, cache.range(&5, &5).unwrap().count());
    assert!(matches!(cache.range(&11, &4), Err(CacheError::InvalidRange)));
}

#[test]
fn test_clear_cache_resets_everything() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    cache.insert(1, "one".to_string());
    cache.insert(2, "two".to_string());
    assert!(cache.lookup(&1).is_ok());
    assert!(cache.lookup(&3).is_err());

    cache.clear_cache();
    assert_eq!(0, cache.item_count());
    assert_eq!(FIXED_OVERHEAD, cache.size());
    assert_eq!(0, cache.hit_count());
    assert_eq!(0, cache.valid_count());

    // the cache is emptied, not retired
    cache.insert(1, "one".to_string());
    assert!(cache.lookup(&1).is_ok());
}

#[test]
fn test_hit_and_valid_counters() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    cache.insert(1, "one".to_string());
    assert!(cache.lookup(&1).is_ok());
    assert!(cache.lookup(&2).is_err());
    assert!(cache.lookup(&1).is_ok());
    assert!(cache.lookup(&3).is_err());

    assert_eq!(4, cache.hit_count());
    assert_eq!(2, cache.valid_count());

    // removal and range queries are not lookups
    cache.remove(&1).expect("Present");
    let _ = cache.range(&0, &10).unwrap().count();
    assert_eq!(4, cache.hit_count());
}

#[test]
fn test_decrement_valid_count() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    cache.insert(1, "one".to_string());
    assert!(cache.lookup(&1).is_ok());
    assert_eq!(1, cache.valid_count());

    cache.decrement_valid_count();
    assert_eq!(0, cache.valid_count());
    assert_eq!(1, cache.hit_count());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "decremented below zero")]
fn test_decrement_valid_count_below_zero() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);
    cache.decrement_valid_count();
}

#[test]
fn test_in_place_modification_and_adjusted_size() {
    let (mut cache, _clock) = string_cache(1024 * 1024, 0);

    cache.insert(1, "abc".to_string());
    let value = cache.lookup_mut(&1).expect("Present");
    let before = value.size_hint() as i64;
    value.push_str("defgh");
    let delta = value.size_hint() as i64 - before;
    cache.adjust_tracked_size(delta);

    assert_eq!(Ok(&"abcdefgh".to_string()), cache.lookup(&1));
    assert_eq!(expected_size(&cache, 8), cache.size());

    cache.adjust_tracked_size(-8);
    assert_eq!(expected_size(&cache, 0), cache.size());
}

#[test]
fn test_request_stats() {
    let (mut cache, _clock) = string_cache(4096, 0);

    cache.insert(1, "one".to_string());
    assert!(cache.lookup(&1).is_ok());
    assert!(cache.lookup(&2).is_err());

    let mut reported = vec![];
    cache.request_stats(|key, description, value| {
        reported.push((key.to_string(), description.to_string(), value.to_string()))
    });

    let size = cache.size().to_string();
    let expected = vec![
        ("cache_test_items", "Cache test items", "1"),
        ("cache_test_size", "Cache test size", size.as_str()),
        ("cache_test_maxsz", "Cache test maximum size", "4096"),
        ("cache_test_req", "Cache test requests", "2"),
        ("cache_test_hit", "Cache test hits", "1"),
    ];
    assert_eq!(expected.len(), reported.len());
    for ((key, description, value), (e_key, e_description, e_value)) in
        reported.iter().zip(expected)
    {
        assert_eq!(e_key, key);
        assert_eq!(e_description, description);
        assert_eq!(e_value, value);
    }

    let stats = cache.stats();
    assert_eq!(1, stats.items);
    assert_eq!(2, stats.hits);
    assert_eq!(1, stats.valid);
    assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    cache.dump_stats(log::Level::Info);
}

#[test]
fn test_peek_leaves_counters_and_age_alone() {
    let (mut cache, clock) = string_cache(4096, 10);
    cache.insert(1, "one".to_string());
    cache.insert(2, "two".to_string());

    clock.advance(10);
    assert_eq!(Some(&"one".to_string()), cache.peek(&1));
    assert_eq!(None, cache.peek(&3));
    assert_eq!(0, cache.hit_count());
    assert_eq!(0, cache.valid_count());
    // no sweep ran, both aged entries are still held
    assert_eq!(2, cache.item_count());

    assert_eq!(Err(CacheError::NotFound), cache.lookup(&1));
    assert_eq!(0, cache.item_count());
}

#[test]
fn test_size_saturates_with_huge_tracked_bytes() {
    let (mut cache, _clock) = string_cache(u64::MAX, 0);
    cache.insert(1, "one".to_string());
    cache.adjust_tracked_size(i64::MAX);
    cache.adjust_tracked_size(i64::MAX);
    cache.adjust_tracked_size(i64::MAX);

    assert_eq!(u64::MAX, cache.size());
    let stats = cache.stats();
    assert_eq!(u64::MAX, stats.size);
}
