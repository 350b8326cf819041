//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache contract against arbitrary keys, values
//! and operation sequences.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::cache::store::{decode_value, encode_value};
use crate::cache::{expiry_after, now_truncated, Cache, CacheOptions, MAX_KEY_LENGTH};
use crate::config::{coerce_max_entries, DEFAULT_MAX_ENTRIES};
use crate::table::{CacheTable, MemoryTable};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_TIMEOUT: u64 = 300;

fn memory_cache(max_entries: usize) -> (Arc<MemoryTable>, Cache) {
    let table = Arc::new(MemoryTable::new());
    let cache = Cache::new(
        table.clone(),
        CacheOptions {
            max_entries,
            timeout: TEST_TIMEOUT,
        },
    )
    .unwrap();
    (table, cache)
}

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,60}".prop_map(|s| s)
}

/// Structured value covering the shapes the codec has to keep apart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Payload {
    Unit,
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Maybe(Option<Option<i64>>),
    List(Vec<Payload>),
    Record(BTreeMap<String, Payload>),
}

/// Generates structured values a few levels deep
fn value_strategy() -> impl Strategy<Value = Payload> {
    let float = prop_oneof![
        any::<f64>().prop_filter("NaN never compares equal", |f| !f.is_nan()),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ];
    let leaf = prop_oneof![
        Just(Payload::Unit),
        any::<bool>().prop_map(Payload::Flag),
        any::<i64>().prop_map(Payload::Int),
        float.prop_map(Payload::Float),
        "[a-zA-Z0-9 ]{0,32}".prop_map(Payload::Text),
        any::<Option<Option<i64>>>().prop_map(Payload::Maybe),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Payload::List),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4).prop_map(Payload::Record),
        ]
    })
}

/// A single cache operation against a small key space
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Payload },
    Get { key: String },
    Delete { key: String },
}

fn small_key_strategy() -> impl Strategy<Value = String> {
    "k[0-4]".prop_map(|s| s)
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (small_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        small_key_strategy().prop_map(|key| CacheOp::Get { key }),
        small_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing a value and reading it back before expiry returns an equal value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in value_strategy()) {
        let (_, cache) = memory_cache(TEST_MAX_ENTRIES);

        cache.set(&key, &value).unwrap();

        let retrieved: Option<Payload> = cache.get(&key, None).unwrap();
        prop_assert_eq!(retrieved, Some(value));
    }

    // A second set on the same key replaces the value and leaves one row.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let (table, cache) = memory_cache(TEST_MAX_ENTRIES);

        cache.set(&key, &value1).unwrap();
        cache.set(&key, &value2).unwrap();

        let retrieved: Option<Payload> = cache.get(&key, None).unwrap();
        prop_assert_eq!(retrieved, Some(value2));
        prop_assert_eq!(table.count().unwrap(), 1);
    }

    // Delete is idempotent and a later get yields the sentinel.
    #[test]
    fn prop_delete_removes_entry(
        key in valid_key_strategy(),
        value in value_strategy(),
        stored in any::<bool>()
    ) {
        let (_, cache) = memory_cache(TEST_MAX_ENTRIES);
        if stored {
            cache.set(&key, &value).unwrap();
        }

        cache.delete(&key).unwrap();
        cache.delete(&key).unwrap();

        let sentinel = Payload::Text("sentinel".to_string());
        prop_assert_eq!(cache.get(&key, sentinel.clone()).unwrap(), sentinel);
    }

    // An expired row reads as a miss and is physically gone afterwards.
    #[test]
    fn prop_expired_rows_are_masked(
        key in valid_key_strategy(),
        value in value_strategy(),
        age in 1i64..100_000
    ) {
        let (table, cache) = memory_cache(TEST_MAX_ENTRIES);
        let payload = encode_value(&value).unwrap();
        table.insert(&key, &payload, now_truncated() - TimeDelta::seconds(age)).unwrap();

        let retrieved: Option<Payload> = cache.get(&key, None).unwrap();
        prop_assert!(retrieved.is_none());
        prop_assert!(table.select_by_key(&key).unwrap().is_empty());
    }

    // Once over capacity, the next set removes every expired row.
    #[test]
    fn prop_capacity_triggers_cull(
        max_entries in 0usize..20,
        expired_count in 1usize..20,
        live_count in 0usize..20
    ) {
        let (table, cache) = memory_cache(max_entries);
        let stale = now_truncated() - TimeDelta::seconds(10);
        for i in 0..expired_count {
            table.insert(&format!("dead{}", i), &encode_value(&0u8).unwrap(), stale).unwrap();
        }
        for i in 0..live_count {
            table
                .insert(&format!("live{}", i), &encode_value(&1u8).unwrap(), expiry_after(300))
                .unwrap();
        }
        let before = table.count().unwrap();

        cache.set("fresh", &1u8).unwrap();

        let after = table.count().unwrap();
        if before > max_entries as u64 {
            prop_assert_eq!(after, live_count as u64 + 1);
            prop_assert!(after < before + 1);
        } else {
            prop_assert_eq!(after, before + 1);
        }
    }

    // Without expired rows the table grows by at most one row per set.
    #[test]
    fn prop_no_expired_rows_grows_by_one(
        max_entries in 0usize..10,
        keys in prop::collection::vec(valid_key_strategy(), 1..30)
    ) {
        let (table, cache) = memory_cache(max_entries);
        let mut distinct = std::collections::HashSet::new();

        for key in &keys {
            cache.set(key, key).unwrap();
            distinct.insert(key.clone());
            prop_assert_eq!(table.count().unwrap(), distinct.len() as u64);
        }
    }

    // Any sequence of operations agrees with a plain map model.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (table, cache) = memory_cache(TEST_MAX_ENTRIES);
        let mut model: HashMap<String, Payload> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(&key, &value).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let found: Option<Payload> = cache.get(&key, None).unwrap();
                    prop_assert_eq!(found.as_ref(), model.get(&key));
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key).unwrap();
                    model.remove(&key);
                }
            }
        }

        prop_assert_eq!(table.count().unwrap(), model.len() as u64);
    }

    // Inputs that are not integers coerce to the default threshold.
    #[test]
    fn prop_non_integer_max_entries_defaults(raw in "[a-zA-Z.\\-]{1,12}") {
        prop_assume!(raw.trim().parse::<i64>().is_err());
        prop_assert_eq!(coerce_max_entries(&raw), DEFAULT_MAX_ENTRIES);
    }

    // Keys over the column width are refused without touching the table.
    #[test]
    fn prop_long_keys_rejected(extra in 1usize..40) {
        let (table, cache) = memory_cache(TEST_MAX_ENTRIES);
        let key = "k".repeat(MAX_KEY_LENGTH + extra);

        prop_assert!(cache.set(&key, &1u8).is_err());
        prop_assert_eq!(table.count().unwrap(), 0);
    }
}

// == Concurrency Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Serialize, Deserialize)]
    struct Stamp {
        worker: u32,
        round: u32,
    }

    #[test]
    fn test_concurrent_writers_never_fail() {
        let (table, cache) = memory_cache(TEST_MAX_ENTRIES);

        let handles: Vec<_> = (0..8u32)
            .map(|worker| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for round in 0..50 {
                        cache.set("shared", &Stamp { worker, round }).unwrap();
                        let _: Option<Stamp> = cache.get("shared", None).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread should not panic");
        }

        // Racing inserts may leave duplicates, but every row holds a whole value
        let rows = table.select_by_key("shared").unwrap();
        assert!(!rows.is_empty());
        for row in rows {
            let stamp: Stamp = decode_value(&row.value).unwrap();
            assert!(stamp.worker < 8 && stamp.round < 50);
        }
    }

    #[test]
    fn test_duplicate_rows_removed_by_delete() {
        let (table, cache) = memory_cache(TEST_MAX_ENTRIES);
        table.insert("dup", b"1", expiry_after(60)).unwrap();
        table.insert("dup", b"2", expiry_after(60)).unwrap();

        assert_eq!(cache.delete("dup").unwrap(), 2);
        assert!(!cache.contains("dup").unwrap());
    }
}
