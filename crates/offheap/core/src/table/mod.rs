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

//! Sharded, reference-counted object tables
//!
//! An [`ObjectTable`] maps keys to fixed-size payloads living in off-heap
//! slots. The key space is split into independently locked shards, and every
//! slot starts with a [`LivenessGate`] header deciding who may use it.
//!
//! Reclamation works the same for both header kinds. Every acquisition is
//! counted (pinned) while the shard lock is held, so an entry can only gain
//! holders while it is mapped. Removing an entry from its shard subtracts one
//! extra count, which moves the "no holders" point from `0` to `-1`; whoever
//! brings the count to exactly `-1` drops the key and recycles the slot. A
//! slot therefore never returns to the pool while a handle on it is alive.
//!
//! Heavy tables give readers a shared and writers an exclusive gate; light
//! tables rely on the count alone and hand out the payload through unsafe
//! accessors.
//!
//! A caller holding a handle on a heavy table must not trigger eviction in
//! the same table from the same thread (a get-or-create past the objects
//! limit): eviction may pick the held entry and wait for it forever.

mod handle;
mod slot;
mod stats;

use std::collections::HashMap;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::config::{ReleasePolicy, TableConfig};
use crate::error::{OffheapError, OffheapResult, invalid_config};
use crate::header::{HeavyHeader, LightHeader, LivenessGate};
use crate::key::TableKey;
use crate::memory::{ObjectPool, PoolSnapshot};

pub use handle::{ObjectMut, ObjectRef};
use slot::{Slot, SlotLayout};
pub use stats::{TableSnapshot, TableStats};

/// Hook receiving an object's key and payload
pub type ObjectHook<K> = Box<dyn Fn(&K, &mut [u8]) + Send + Sync>;

/// Table of status-tracked objects behind a read/write gate
pub type HeavyTable<K> = ObjectTable<K, HeavyHeader>;
/// Table of reference-counted objects without a gate
pub type LightTable<K> = ObjectTable<K, LightHeader>;

type Shard<K> = CachePadded<RwLock<HashMap<K, Slot>>>;

/// Concurrent map from keys to off-heap objects
pub struct ObjectTable<K: TableKey, G: LivenessGate> {
    name: String,
    shards: Box<[Shard<K>]>,
    pool: ObjectPool,
    layout: SlotLayout<K, G>,
    release_policy: ReleasePolicy,
    prepare_new_object: Option<ObjectHook<K>>,
    before_release_object: Option<ObjectHook<K>>,
    evict_cursor: AtomicUsize, // Shard where the next eviction scan starts
    stats: TableStats,
}

impl<K: TableKey, G: LivenessGate> ObjectTable<K, G> {
    /// Build a table from its configuration
    ///
    /// # Arguments
    /// * `config` - Must name this table's key type and header variant
    ///
    /// # Returns
    /// * `OffheapResult<Self>` - The table, or the configuration/mapping error
    pub fn new(config: &TableConfig) -> OffheapResult<Self> {
        config.validate()?;
        if config.key_type != K::key_type() {
            return Err(invalid_config(format!(
                "table {}: configured for {} keys but built for {} keys",
                config.name,
                config.key_type,
                K::key_type()
            )));
        }
        if config.variant != G::VARIANT {
            return Err(invalid_config(format!(
                "table {}: configured as {} but built as {}",
                config.name,
                config.variant,
                G::VARIANT
            )));
        }

        let layout = SlotLayout::new(config.object_size);
        let pool = ObjectPool::new(layout.slot_size, config.objects_limit)?;
        let shards = (0..config.shard_count).map(|_| CachePadded::new(RwLock::new(HashMap::new()))).collect();

        info!(
            table = %config.name,
            variant = %G::VARIANT,
            key_type = %config.key_type,
            object_size = config.object_size,
            slot_size = layout.slot_size,
            shard_count = config.shard_count,
            "object table created"
        );

        Ok(Self {
            name: config.name.clone(),
            shards,
            pool,
            layout,
            release_policy: config.release_policy,
            prepare_new_object: None,
            before_release_object: None,
            evict_cursor: AtomicUsize::new(0),
            stats: TableStats::new(),
        })
    }

    /// Run `prepare` on the payload of every newly created object before anyone sees it
    ///
    /// On light tables the hook runs under the shard write lock and must not
    /// call back into the table.
    pub fn with_prepare_new_object<F>(mut self, prepare: F) -> Self
    where
        F: Fn(&K, &mut [u8]) + Send + Sync + 'static,
    {
        self.prepare_new_object = Some(Box::new(prepare));
        self
    }

    /// Run `teardown` on the payload of every object removed by delete or eviction
    pub fn with_before_release_object<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&K, &mut [u8]) + Send + Sync + 'static,
    {
        self.before_release_object = Some(Box::new(teardown));
        self
    }

    fn shard(&self, key: &K) -> &RwLock<HashMap<K, Slot>> {
        &self.shards[key.shard_index(self.shards.len())]
    }

    fn gate(&self, slot: Slot) -> &G {
        // Every slot reaching here was initialized by `create`.
        unsafe { self.layout.gate(slot) }
    }

    /// Look the key up and pin its object while the shard lock is held
    fn pin_entry(&self, key: &K) -> Option<Slot> {
        let map = self.shard(key).read();
        let slot = *map.get(key)?;
        self.gate(slot).pin();
        Some(slot)
    }

    /// Get the object for `key`, creating it when absent
    ///
    /// Returns the read handle and whether the object already existed. When
    /// several threads race on a missing key exactly one of them creates it;
    /// the others discard their speculative slot and share the winner.
    pub fn must_get_object(&self, key: &K) -> OffheapResult<(ObjectRef<'_, K, G>, bool)> {
        loop {
            if let Some(handle) = self.read_existing(key)? {
                self.stats.inc_hits();
                counter!("offheap_table_hits", 1);
                return Ok((handle, true));
            }

            self.stats.inc_misses();
            counter!("offheap_table_misses", 1);
            if let Some(found) = self.create(key)? {
                return Ok(found);
            }
        }
    }

    /// Get the object for `key` without creating it
    pub fn try_get_object(&self, key: &K) -> OffheapResult<Option<ObjectRef<'_, K, G>>> {
        let found = self.read_existing(key)?;
        if found.is_some() {
            self.stats.inc_hits();
            counter!("offheap_table_hits", 1);
        } else {
            self.stats.inc_misses();
            counter!("offheap_table_misses", 1);
        }
        Ok(found)
    }

    /// Get the object for `key` for writing, waiting out current readers
    pub fn try_get_object_mut(&self, key: &K) -> OffheapResult<Option<ObjectMut<'_, K, G>>> {
        loop {
            let Some(slot) = self.pin_entry(key) else {
                self.stats.inc_misses();
                return Ok(None);
            };
            let gate = self.gate(slot);
            if gate.try_acquire_write() && self.slot_key(slot) == key {
                self.stats.inc_hits();
                return Ok(Some(ObjectMut::new(self, slot)));
            }
            self.settle(slot, gate.release_write())?;
        }
    }

    fn read_existing(&self, key: &K) -> OffheapResult<Option<ObjectRef<'_, K, G>>> {
        loop {
            let Some(slot) = self.pin_entry(key) else {
                return Ok(None);
            };
            if let Some(handle) = self.validate_read(key, slot)? {
                return Ok(Some(handle));
            }
        }
    }

    /// Take the shared side of a pinned slot and check it still holds `key`
    fn validate_read(&self, key: &K, slot: Slot) -> OffheapResult<Option<ObjectRef<'_, K, G>>> {
        let gate = self.gate(slot);
        if gate.try_acquire_read() && self.slot_key(slot) == key {
            return Ok(Some(ObjectRef::new(self, slot)));
        }
        self.settle(slot, gate.release_read())?;
        Ok(None)
    }

    /// Slow path of get-or-create; `None` asks the caller to retry
    fn create(&self, key: &K) -> OffheapResult<Option<(ObjectRef<'_, K, G>, bool)>> {
        let slot = Slot::new(self.pool.alloc_with(|| self.evict_one())?);
        // The slot came out of the pool, so no header lives in it.
        unsafe { self.layout.init(slot, key.clone()) };
        let gate = self.gate(slot);
        gate.pin();
        // Fresh header: the gate is free and the object not yet live.
        gate.try_acquire_write();

        let mut map = self.shard(key).write();
        if let Some(&winner) = map.get(key) {
            self.gate(winner).pin();
            drop(map);
            self.discard(slot);
            return Ok(self.validate_read(key, winner)?.map(|handle| (handle, true)));
        }

        if G::EXCLUSIVE_GATE {
            // Readers finding the entry wait on the gate until it is prepared.
            map.insert(key.clone(), slot);
            drop(map);
            self.prepare(key, slot);
            gate.complete_init();
            gate.downgrade();
        } else {
            self.prepare(key, slot);
            gate.complete_init();
            map.insert(key.clone(), slot);
            drop(map);
        }

        self.stats.inc_creations();
        counter!("offheap_table_creations", 1);
        Ok(Some((ObjectRef::new(self, slot), false)))
    }

    fn prepare(&self, key: &K, slot: Slot) {
        if let Some(prepare) = &self.prepare_new_object {
            // The creator holds the only acquisition.
            prepare(key, unsafe { self.payload_mut(slot) });
        }
    }

    /// Throw away a speculative slot that lost the creation race
    fn discard(&self, slot: Slot) {
        let gate = self.gate(slot);
        gate.release_write();
        // Never published, so nobody else can reach the key.
        unsafe { self.layout.drop_key(slot) };
        gate.reset();
        self.pool.release(slot.addr());
        self.stats.inc_discarded();
    }

    /// Delete the object for `key`
    ///
    /// Waits for an exclusive acquisition, runs the before-release hook and
    /// removes the entry. Returns whether this call removed it; racing
    /// deleters of the same key see `false`. On a light table handles still
    /// held elsewhere stay valid and the last of them recycles the slot.
    pub fn delete_object(&self, key: &K) -> OffheapResult<bool> {
        let Some(slot) = self.pin_entry(key) else {
            return Ok(false);
        };

        let gate = self.gate(slot);
        if !gate.try_acquire_write() || self.slot_key(slot) != key {
            self.settle(slot, gate.release_write())?;
            return Ok(false);
        }

        if let Some(teardown) = &self.before_release_object {
            teardown(key, unsafe { self.payload_mut(slot) });
        }
        gate.mark_for_release();
        let removed = gate.try_finalize_release() && self.detach(key, slot);
        self.settle(slot, gate.release_write())?;

        if removed {
            self.stats.inc_deletions();
            counter!("offheap_table_deletions", 1);
        }
        Ok(removed)
    }

    /// Remove `key` from its shard if it still maps to `slot`
    fn detach(&self, key: &K, slot: Slot) -> bool {
        let mut map = self.shard(key).write();
        if map.get(key) != Some(&slot) {
            return false;
        }
        map.remove(key);
        drop(map);

        self.pool.retire();
        // The caller still holds its own acquisition, so this stays >= 0.
        self.gate(slot).unpin();
        true
    }

    /// Evict one object to make room under the objects limit
    ///
    /// The first pass only considers idle objects, the second any live one.
    /// Which object is picked within a pass depends on shard map iteration
    /// order and is not deterministic.
    pub fn evict_one(&self) -> bool {
        for idle_only in [true, false] {
            while let Some(victim) = self.find_victim(idle_only) {
                match self.delete_object(&victim) {
                    Ok(true) => {
                        self.stats.inc_evictions();
                        counter!("offheap_table_evictions", 1);
                        debug!(table = %self.name, key = ?victim, idle_only, "evicted object");
                        return true;
                    }
                    // Someone else removed it first; look again.
                    Ok(false) => continue,
                    Err(err) => {
                        error!(table = %self.name, key = ?victim, %err, "eviction failed");
                        return false;
                    }
                }
            }
        }
        false
    }

    fn find_victim(&self, idle_only: bool) -> Option<K> {
        let count = self.shards.len();
        let start = self.evict_cursor.fetch_add(1, Ordering::Relaxed);
        for step in 0..count {
            let map = self.shards[(start + step) % count].read();
            let victim = map.iter().find(|&(_, &slot)| {
                let gate = self.gate(slot);
                gate.is_live() && (!idle_only || gate.accessors() == 0)
            });
            if let Some((key, _)) = victim {
                return Some(key.clone());
            }
        }
        None
    }

    /// Release one acquisition taken through a handle
    pub(crate) fn release_handle(&self, slot: Slot, exclusive: bool) -> OffheapResult<()> {
        if !G::EXCLUSIVE_GATE && self.release_policy == ReleasePolicy::Eager {
            return self.release_eager(slot);
        }
        let gate = self.gate(slot);
        let remaining = if exclusive { gate.release_write() } else { gate.release_read() };
        self.settle(slot, remaining)
    }

    /// Release and remove the entry once it goes idle
    ///
    /// The decrement happens under the shard write lock so nobody can pin the
    /// entry between the count reaching zero and its removal.
    fn release_eager(&self, slot: Slot) -> OffheapResult<()> {
        let gate = self.gate(slot);
        // Still pinned by this handle, the key cannot go away.
        let key = self.slot_key(slot);
        let mut map = self.shard(key).write();
        let remaining = gate.release_read();
        if remaining == 0 && map.get(key) == Some(&slot) {
            map.remove(key);
            drop(map);
            if let Some(teardown) = &self.before_release_object {
                // Unmapped at zero holders, so nobody else can reach the payload.
                teardown(key, unsafe { self.payload_mut(slot) });
            }
            self.pool.retire();
            self.stats.inc_deletions();
            counter!("offheap_table_deletions", 1);
            return self.settle(slot, gate.unpin());
        }
        drop(map);
        self.settle(slot, remaining)
    }

    /// Act on the count left by a release
    fn settle(&self, slot: Slot, remaining: i32) -> OffheapResult<()> {
        match remaining {
            -1 => {
                self.reclaim(slot);
                Ok(())
            }
            n if n < -1 => {
                error!(table = %self.name, accessors = n, "object released more times than it was acquired");
                Err(OffheapError::OverRelease(n))
            }
            _ => Ok(()),
        }
    }

    /// Recycle a detached slot whose last holder just left
    fn reclaim(&self, slot: Slot) {
        // Count is -1: the entry is unmapped and nobody holds the slot.
        unsafe { self.layout.drop_key(slot) };
        self.gate(slot).reset();
        self.pool.recycle(slot.addr());
    }

    /// Visit every entry with its current accessor count
    ///
    /// Each shard is visited under its read lock; `visit` returns `false` to
    /// stop early and must not modify this table.
    pub fn list_objects<F>(&self, mut visit: F)
    where
        F: FnMut(&K, i32) -> bool,
    {
        for shard in self.shards.iter() {
            let map = shard.read();
            for (key, &slot) in map.iter() {
                if !visit(key, self.gate(slot).accessors()) {
                    return;
                }
            }
        }
    }

    pub(crate) fn slot_key(&self, slot: Slot) -> &K {
        // Callers hold an acquisition on the slot.
        unsafe { self.layout.key(slot) }
    }

    pub(crate) fn slot_accessors(&self, slot: Slot) -> i32 {
        self.gate(slot).accessors()
    }

    pub(crate) fn payload_ptr(&self, slot: Slot) -> *mut u8 {
        self.layout.payload_ptr(slot)
    }

    /// # Safety
    /// The caller holds an acquisition and no one writes the payload meanwhile.
    pub(crate) unsafe fn payload(&self, slot: Slot) -> &[u8] {
        unsafe { slice::from_raw_parts(self.layout.payload_ptr(slot), self.layout.payload_size) }
    }

    /// # Safety
    /// The caller holds an acquisition and no one else touches the payload meanwhile.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn payload_mut(&self, slot: Slot) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.layout.payload_ptr(slot), self.layout.payload_size) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload size of every object
    pub fn object_size(&self) -> usize {
        self.layout.payload_size
    }

    /// Full slot size including the header
    pub fn slot_size(&self) -> usize {
        self.layout.slot_size
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn objects_limit(&self) -> Option<usize> {
        self.pool.objects_limit()
    }

    pub fn release_policy(&self) -> ReleasePolicy {
        self.release_policy
    }

    /// Number of mapped entries, summed shard by shard
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Slots allocated and not yet returned, including detached ones still held
    pub fn active_objects(&self) -> usize {
        self.pool.active()
    }

    pub fn pool_stats(&self) -> PoolSnapshot {
        self.pool.stats()
    }

    pub fn stats(&self) -> TableSnapshot {
        TableSnapshot::capture(&self.name, self.len(), &self.stats, self.pool.stats())
    }
}

impl<K: TableKey, G: LivenessGate> Drop for ObjectTable<K, G> {
    fn drop(&mut self) {
        // Handles borrow the table, so only mapped entries still own keys.
        for shard in self.shards.iter_mut() {
            for (_, slot) in shard.get_mut().drain() {
                unsafe { self.layout.drop_key(slot) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::key::{Bytes12, KeyType};
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;

    fn heavy_strings() -> HeavyTable<String> {
        HeavyTable::new(&TableConfig::heavy("heavy", 32, KeyType::String).with_shard_count(4)).unwrap()
    }

    fn light_ints(policy: ReleasePolicy) -> LightTable<i64> {
        LightTable::new(&TableConfig::light("light", 16, KeyType::Int64).with_shard_count(4).with_release_policy(policy)).unwrap()
    }

    #[test]
    fn test_config_must_match_types() {
        let config = TableConfig::heavy("t", 8, KeyType::Int32);
        assert!(matches!(HeavyTable::<String>::new(&config), Err(OffheapError::InvalidConfiguration(_))));
        assert!(matches!(LightTable::<i32>::new(&config), Err(OffheapError::InvalidConfiguration(_))));
        assert!(HeavyTable::<i32>::new(&config).is_ok());
    }

    #[test]
    fn test_get_or_create_then_hit() {
        let table = heavy_strings();
        let key = "alpha".to_string();

        let (handle, existed) = table.must_get_object(&key).unwrap();
        assert!(!existed);
        assert_eq!(handle.key(), &key);
        let addr = handle.as_ptr();
        drop(handle);

        let (handle, existed) = table.must_get_object(&key).unwrap();
        assert!(existed);
        assert_eq!(handle.as_ptr(), addr);
        assert_eq!(table.len(), 1);

        let stats = table.stats();
        assert_eq!(stats.creations, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_prepare_hook_initializes_payload() {
        let table = heavy_strings().with_prepare_new_object(|key, payload| {
            payload.fill(0);
            payload[..key.len()].copy_from_slice(key.as_bytes());
        });
        let (handle, _) = table.must_get_object(&"beta".to_string()).unwrap();
        assert_eq!(&handle.payload()[..4], b"beta");
        assert!(handle.payload()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_handle_updates_payload() {
        let table = heavy_strings();
        let key = "gamma".to_string();
        table.must_get_object(&key).unwrap().0.release().unwrap();

        {
            let mut writer = table.try_get_object_mut(&key).unwrap().unwrap();
            writer.payload_mut()[0] = 42;
        }
        let reader = table.try_get_object(&key).unwrap().unwrap();
        assert_eq!(reader.payload()[0], 42);
        assert!(table.try_get_object_mut(&"missing".to_string()).unwrap().is_none());
    }

    #[test]
    fn test_try_get_missing() {
        let table = heavy_strings();
        assert!(table.try_get_object(&"nothing".to_string()).unwrap().is_none());
        assert_eq!(table.stats().misses, 1);
    }

    #[test]
    fn test_delete_runs_hook_and_recycles() {
        let released = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&released);
        let table = heavy_strings().with_before_release_object(move |_, _| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        let key = "delta".to_string();

        table.must_get_object(&key).unwrap().0.release().unwrap();
        assert!(table.delete_object(&key).unwrap());
        assert!(!table.delete_object(&key).unwrap());
        assert_eq!(released.load(Ordering::Relaxed), 1);
        assert!(table.is_empty());
        assert_eq!(table.active_objects(), 0);
        assert_eq!(table.pool_stats().released, 1);

        let (handle, existed) = table.must_get_object(&key).unwrap();
        assert!(!existed);
        assert_eq!(handle.accessors(), 1);
        assert_eq!(table.pool_stats().recycled, 1);
    }

    #[test]
    fn test_light_delete_waits_for_last_holder() {
        let table = light_ints(ReleasePolicy::Cache);
        let (held, _) = table.must_get_object(&7).unwrap();

        assert!(table.delete_object(&7).unwrap());
        assert!(table.try_get_object(&7).unwrap().is_none());
        // Still held, so not recycled yet
        assert_eq!(table.pool_stats().released, 0);
        assert_eq!(held.accessors(), 0);

        held.release().unwrap();
        assert_eq!(table.pool_stats().released, 1);
    }

    #[test]
    fn test_light_cache_policy_keeps_idle_entries() {
        let table = light_ints(ReleasePolicy::Cache);
        table.must_get_object(&1).unwrap().0.release().unwrap();
        assert_eq!(table.len(), 1);
        let (handle, existed) = table.must_get_object(&1).unwrap();
        assert!(existed);
        assert_eq!(handle.accessors(), 1);
    }

    #[test]
    fn test_light_eager_policy_releases_idle_entries() {
        let table = light_ints(ReleasePolicy::Eager);
        let (first, _) = table.must_get_object(&1).unwrap();
        let (second, existed) = table.must_get_object(&1).unwrap();
        assert!(existed);

        first.release().unwrap();
        assert_eq!(table.len(), 1);
        second.release().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.active_objects(), 0);
        assert_eq!(table.pool_stats().released, 1);
    }

    #[test]
    fn test_light_eager_release_runs_teardown_once() {
        let released = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&released);
        let table = light_ints(ReleasePolicy::Eager).with_before_release_object(move |key, payload| {
            assert_eq!(*key, 1);
            assert_eq!(payload[0], 5);
            seen.fetch_add(1, Ordering::Relaxed);
        });

        let (first, _) = table.must_get_object(&1).unwrap();
        unsafe { first.payload_mut()[0] = 5 };
        let (second, _) = table.must_get_object(&1).unwrap();
        first.release().unwrap();
        assert_eq!(released.load(Ordering::Relaxed), 0);

        second.release().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.pool_stats().released, 1);
        assert_eq!(released.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_light_payload_access() {
        let table = LightTable::<Bytes12>::new(&TableConfig::light("ids", 8, KeyType::Bytes(12))).unwrap();
        let key = [3u8; 12];
        let (handle, _) = table.must_get_object(&key).unwrap();
        unsafe { handle.payload_mut()[0] = 9 };
        drop(handle);
        let handle = table.try_get_object(&key).unwrap().unwrap();
        assert_eq!(unsafe { handle.payload() }[0], 9);
    }

    #[test]
    fn test_eviction_prefers_idle_objects() {
        let config = TableConfig::heavy("bounded", 16, KeyType::Uint64).with_objects_limit(3).with_shard_count(2);
        let table = HeavyTable::<u64>::new(&config).unwrap();

        for key in 0..3u64 {
            table.must_get_object(&key).unwrap().0.release().unwrap();
        }
        // A held object is skipped while idle ones remain
        let (busy, _) = table.must_get_object(&0).unwrap();
        table.must_get_object(&10).unwrap().0.release().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.active_objects(), 3);
        assert_eq!(table.stats().evictions, 1);
        assert!(table.try_get_object(&10).unwrap().is_some());
        assert!(table.try_get_object(&0).unwrap().is_some());
        drop(busy);
    }

    #[test]
    fn test_light_eviction_takes_referenced_object() {
        let config = TableConfig::light("bounded", 16, KeyType::Int64).with_objects_limit(1).with_shard_count(1);
        let table = LightTable::<i64>::new(&config).unwrap();

        let (held, _) = table.must_get_object(&1).unwrap();
        let (fresh, existed) = table.must_get_object(&2).unwrap();
        assert!(!existed);
        assert_eq!(table.len(), 1);
        assert!(table.try_get_object(&1).unwrap().is_none());
        assert_eq!(table.stats().evictions, 1);

        // The evicted object stays usable until released
        assert_eq!(held.key(), &1);
        held.release().unwrap();
        fresh.release().unwrap();
        assert_eq!(table.pool_stats().released, 1);
    }

    #[test]
    fn test_list_objects() {
        let table = light_ints(ReleasePolicy::Cache);
        let (held, _) = table.must_get_object(&5).unwrap();
        for key in 0..5 {
            table.must_get_object(&key).unwrap().0.release().unwrap();
        }

        let mut seen = Vec::new();
        table.list_objects(|key, accessors| {
            seen.push((*key, accessors));
            true
        });
        seen.sort_unstable();
        assert_eq!(seen, vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 1)]);

        let mut visited = 0;
        table.list_objects(|_, _| {
            visited += 1;
            visited < 2
        });
        assert_eq!(visited, 2);
        drop(held);
    }

    #[test]
    fn test_drop_table_with_entries() {
        let table = heavy_strings();
        for i in 0..100 {
            table.must_get_object(&format!("key-{i}")).unwrap();
        }
        assert_eq!(table.len(), 100);
        drop(table);
    }
}
