// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Multi-threaded behaviour of object tables
//!
//! - Racing get-or-create calls agree on one object and one creator
//! - Deleted objects come back re-initialized
//! - The objects limit holds under churn
//! - Heavy writers never overlap readers
//! - Random mixed workloads leave no leaked slots

use std::collections::HashSet;
use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use offheap_core::{HeavyTable, KeyType, LightTable, ReleasePolicy, TableConfig};
use rand::Rng;

const THREADS: usize = 8;

#[test]
fn test_get_or_create_is_idempotent() {
    let table = HeavyTable::<String>::new(&TableConfig::heavy("race", 64, KeyType::String)).unwrap();
    let created = AtomicUsize::new(0);
    let barrier = Barrier::new(THREADS);

    for round in 0..20 {
        let key = format!("object-{round}");
        let addrs: Vec<usize> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        let (handle, existed) = table.must_get_object(&key).unwrap();
                        if !existed {
                            created.fetch_add(1, Ordering::Relaxed);
                        }
                        handle.as_ptr() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<usize> = addrs.into_iter().collect();
        assert_eq!(unique.len(), 1, "round {round} saw several objects");
    }

    assert_eq!(created.load(Ordering::Relaxed), 20);
    assert_eq!(table.len(), 20);
    assert_eq!(table.active_objects(), 20);
}

#[test]
fn test_light_get_or_create_is_idempotent() {
    let table = LightTable::<u64>::new(&TableConfig::light("race", 8, KeyType::Uint64).with_shard_count(1)).unwrap();
    let created = AtomicUsize::new(0);
    let barrier = Barrier::new(THREADS);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                for key in 0..200u64 {
                    let (_, existed) = table.must_get_object(&key).unwrap();
                    if !existed {
                        created.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(created.load(Ordering::Relaxed), 200);
    assert_eq!(table.len(), 200);
    let stats = table.stats();
    assert_eq!(stats.creations, 200);
    assert_eq!(stats.pool.active, 200);
}

#[test]
fn test_delete_then_get_reinitializes() {
    let table = HeavyTable::<i32>::new(&TableConfig::heavy("reuse", 16, KeyType::Int32))
        .unwrap()
        .with_prepare_new_object(|key, payload| payload[..4].copy_from_slice(&key.to_le_bytes()));

    {
        let mut writer = {
            table.must_get_object(&-5).unwrap();
            table.try_get_object_mut(&-5).unwrap().unwrap()
        };
        writer.payload_mut()[4] = 0xFF;
    }
    assert!(table.delete_object(&-5).unwrap());

    // The recycled slot carries the new key and a fresh prepare
    let (handle, existed) = table.must_get_object(&7).unwrap();
    assert!(!existed);
    assert_eq!(handle.key(), &7);
    assert_eq!(&handle.payload()[..4], &7i32.to_le_bytes());
    assert_eq!(table.pool_stats().recycled, 1);
    assert!(table.try_get_object(&-5).unwrap().is_none());
}

#[test]
fn test_concurrent_deletes_single_winner() {
    let table = HeavyTable::<i64>::new(&TableConfig::heavy("deletes", 8, KeyType::Int64)).unwrap();
    let barrier = Barrier::new(THREADS);

    for key in 0..50i64 {
        table.must_get_object(&key).unwrap();
        let winners = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    if table.delete_object(&key).unwrap() {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(winners.load(Ordering::Relaxed), 1);
    }

    assert!(table.is_empty());
    assert_eq!(table.active_objects(), 0);
    assert_eq!(table.pool_stats().released, 50);
}

#[test]
fn test_objects_limit_holds_under_churn() {
    const LIMIT: usize = 64;
    let config = TableConfig::light("bounded", 32, KeyType::Uint64).with_objects_limit(LIMIT).with_shard_count(8);
    let table = LightTable::<u64>::new(&config).unwrap();

    thread::scope(|scope| {
        for t in 0..4u64 {
            let table = &table;
            scope.spawn(move || {
                for i in 0..2_000u64 {
                    let key = t * 1_000_000 + i;
                    let (handle, _) = table.must_get_object(&key).unwrap();
                    drop(handle);
                    assert!(table.active_objects() <= LIMIT + 4);
                }
            });
        }
    });

    assert!(table.len() <= LIMIT);
    assert!(table.active_objects() <= LIMIT);
    let stats = table.stats();
    assert!(stats.evictions >= 8_000 - LIMIT as u64 - 4);
    assert_eq!(stats.pool.overflows, 0);
}

#[test]
fn test_eager_release_under_contention() {
    let config = TableConfig::light("eager", 8, KeyType::Int32).with_release_policy(ReleasePolicy::Eager);
    let table = LightTable::<i32>::new(&config).unwrap();

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for round in 0..500 {
                    let (handle, _) = table.must_get_object(&(round % 7)).unwrap();
                    handle.release().unwrap();
                }
            });
        }
    });

    assert!(table.is_empty());
    assert_eq!(table.active_objects(), 0);
}

#[test]
fn test_heavy_writers_exclude_readers() {
    const SIZE: usize = 256;
    let table = HeavyTable::<String>::new(&TableConfig::heavy("gate", SIZE, KeyType::String)).unwrap();
    let key = "shared".to_string();
    table.must_get_object(&key).unwrap();
    let torn = AtomicUsize::new(0);

    thread::scope(|scope| {
        for t in 0..2u8 {
            let (table, key) = (&table, &key);
            scope.spawn(move || {
                for i in 0..500u32 {
                    let mut writer = table.try_get_object_mut(key).unwrap().unwrap();
                    writer.payload_mut().fill(t.wrapping_mul(100).wrapping_add(i as u8));
                }
            });
        }
        for _ in 0..4 {
            let (table, key, torn) = (&table, &key, &torn);
            scope.spawn(move || {
                for _ in 0..2_000 {
                    let reader = table.try_get_object(key).unwrap().unwrap();
                    let payload = reader.payload();
                    if payload.iter().any(|&b| b != payload[0]) {
                        torn.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(torn.load(Ordering::Relaxed), 0);
}

#[test]
fn test_readers_racing_delete_never_see_recycled_slots() {
    let table = HeavyTable::<u64>::new(&TableConfig::heavy("churn", 8, KeyType::Uint64).with_shard_count(2))
        .unwrap()
        .with_prepare_new_object(|key, payload| payload.copy_from_slice(&key.to_le_bytes()));

    thread::scope(|scope| {
        let table = &table;
        scope.spawn(move || {
            for round in 0..2_000u64 {
                table.must_get_object(&(round % 4)).unwrap();
                table.delete_object(&(round % 4)).unwrap();
            }
        });
        for _ in 0..4 {
            scope.spawn(move || {
                for round in 0..4_000u64 {
                    let key = round % 4;
                    if let Some(handle) = table.try_get_object(&key).unwrap() {
                        assert_eq!(handle.key(), &key);
                        assert_eq!(handle.payload(), &key.to_le_bytes());
                    }
                }
            });
        }
    });

    table.list_objects(|key, accessors| {
        assert_eq!(accessors, 0, "key {key} still held");
        true
    });
}

#[test]
fn test_random_workload_leaves_no_leaks() {
    let config = TableConfig::heavy("mixed", 24, KeyType::Int64).with_objects_limit(48).with_shard_count(4);
    let table = HeavyTable::<i64>::new(&config).unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            let table = &table;
            scope.spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..3_000 {
                    let key = rng.gen_range(-100i64..100);
                    match rng.gen_range(0..10) {
                        0..=5 => drop(table.must_get_object(&key).unwrap()),
                        6 | 7 => drop(table.try_get_object(&key).unwrap()),
                        8 => {
                            if let Some(mut writer) = table.try_get_object_mut(&key).unwrap() {
                                writer.payload_mut()[0] = 1;
                            }
                        }
                        _ => {
                            table.delete_object(&key).unwrap();
                        }
                    }
                }
            });
        }
    });

    // With no handles left, every allocated slot is a mapped entry
    assert_eq!(table.active_objects(), table.len());
    assert!(table.len() <= 48);
    table.list_objects(|_, accessors| {
        assert_eq!(accessors, 0);
        true
    });
}
