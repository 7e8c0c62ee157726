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

use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use metrics::gauge;
use serde::Serialize;
use tracing::warn;

use crate::error::{OffheapResult, invalid_config};
use crate::memory::arena::Arena;
use crate::memory::recycle::RecyclePool;

/// Hook run on every slot freshly bumped out of the arena
pub type PrepareSlotFn = Box<dyn Fn(&mut [u8]) + Send + Sync>;

/// Stored eviction callback; returns false when no victim was found
pub type EvictFn = Box<dyn Fn() -> bool + Send + Sync>;

/// Counters kept by an [`ObjectPool`]
#[derive(Debug)]
pub struct PoolStats {
    /// Slots served from the recycling pool
    pub recycled: AtomicU64,
    /// Slots served from the arena
    pub bumped: AtomicU64,
    /// Slots released back
    pub released: AtomicU64,
    /// Successful eviction callbacks
    pub evictions: AtomicU64,
    /// Allocations that went past the objects limit
    pub overflows: AtomicU64,
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolStats {
    pub fn new() -> Self {
        Self {
            recycled: AtomicU64::new(0),
            bumped: AtomicU64::new(0),
            released: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
        }
    }

    pub fn inc_recycled(&self) {
        self.recycled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bumped(&self) {
        self.bumped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_overflows(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub active: usize,
    pub segments: usize,
    pub recycled: u64,
    pub bumped: u64,
    pub released: u64,
    pub evictions: u64,
    pub overflows: u64,
}

/// Fixed-size slot allocator with an optional soft objects limit
///
/// Allocation prefers recycled slots and falls back to bumping the arena.
/// When the limit is exceeded the eviction callback is invoked until the
/// active count is back within bounds; a callback that finds no victim lets
/// the pool run over the limit instead of failing the caller.
pub struct ObjectPool {
    arena: Arena,
    recycler: RecyclePool,
    objects_limit: Option<usize>,
    active: AtomicUsize,
    prepare_new_slot: Option<PrepareSlotFn>,
    evictor: Option<EvictFn>,
    stats: PoolStats,
}

impl ObjectPool {
    /// Create a pool of `object_size` byte slots
    ///
    /// # Arguments
    /// * `object_size` - Size of every slot
    /// * `objects_limit` - Soft bound on live slots, `None` when unbounded
    pub fn new(object_size: usize, objects_limit: Option<usize>) -> OffheapResult<Self> {
        Ok(Self {
            arena: Arena::new(object_size, objects_limit)?,
            recycler: RecyclePool::new(),
            objects_limit,
            active: AtomicUsize::new(0),
            prepare_new_slot: None,
            evictor: None,
            stats: PoolStats::new(),
        })
    }

    pub fn with_prepare_new_slot<F>(mut self, prepare: F) -> Self
    where
        F: Fn(&mut [u8]) + Send + Sync + 'static,
    {
        self.prepare_new_slot = Some(Box::new(prepare));
        self
    }

    pub fn with_evictor<F>(mut self, evict: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.evictor = Some(Box::new(evict));
        self
    }

    /// Allocate a slot, evicting through the stored evictor when over the limit
    pub fn alloc(&self) -> OffheapResult<NonNull<u8>> {
        self.alloc_with(|| self.evictor.as_ref().is_some_and(|evict| evict()))
    }

    /// Allocate a slot, evicting through `evict` when over the limit
    ///
    /// `evict` must release one other slot per successful call.
    pub fn alloc_with<E>(&self, mut evict: E) -> OffheapResult<NonNull<u8>>
    where
        E: FnMut() -> bool,
    {
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(limit) = self.objects_limit {
            if active > limit {
                while self.active.load(Ordering::Acquire) > limit {
                    if !evict() {
                        self.stats.inc_overflows();
                        warn!(limit, active = self.active(), "no eviction victim, objects limit exceeded");
                        break;
                    }
                    self.stats.inc_evictions();
                }
            }
        }

        match self.take_slot() {
            Ok(slot) => {
                gauge!("offheap_pool_active_objects", self.active() as f64);
                Ok(slot)
            }
            Err(err) => {
                self.active.fetch_sub(1, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    fn take_slot(&self) -> OffheapResult<NonNull<u8>> {
        let mut bumped = false;
        let addr = self.recycler.get_or_else(|| {
            bumped = true;
            self.arena.bump().map(|slot| slot.as_ptr() as usize)
        })?;

        if bumped {
            self.stats.inc_bumped();
            if let Some(prepare) = &self.prepare_new_slot {
                // A freshly bumped slot is owned by nobody else yet.
                let slot = unsafe { slice::from_raw_parts_mut(addr as *mut u8, self.arena.slot_size()) };
                prepare(slot);
            }
        } else {
            self.stats.inc_recycled();
        }

        NonNull::new(addr as *mut u8).ok_or_else(|| invalid_config("recycling pool returned a null slot"))
    }

    /// Give a slot back: drop it from the active count and recycle it
    ///
    /// The caller guarantees nothing references the slot any more.
    pub fn release(&self, slot: NonNull<u8>) {
        self.retire();
        self.recycle(slot);
    }

    /// Drop one slot from the active count without recycling it yet
    ///
    /// Used when an object leaves its table while holders still use it; the
    /// slot itself comes back later through [`ObjectPool::recycle`].
    pub fn retire(&self) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "retired more slots than allocated");
    }

    /// Return a retired slot to the free lists
    pub fn recycle(&self, slot: NonNull<u8>) {
        self.stats.inc_released();
        self.recycler.put(slot.as_ptr() as usize);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn objects_limit(&self) -> Option<usize> {
        self.objects_limit
    }

    pub fn object_size(&self) -> usize {
        self.arena.slot_size()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn stats(&self) -> PoolSnapshot {
        PoolSnapshot {
            active: self.active(),
            segments: self.arena.segment_count(),
            recycled: self.stats.recycled.load(Ordering::Relaxed),
            bumped: self.stats.bumped.load(Ordering::Relaxed),
            released: self.stats.released.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            overflows: self.stats.overflows.load(Ordering::Relaxed),
        }
    }
}
