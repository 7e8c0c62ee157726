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

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use crate::error::OffheapResult;

static NEXT_THREAD_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // Stable per-thread stand-in for the current core
    static THREAD_SLOT: usize = NEXT_THREAD_SLOT.fetch_add(1, Ordering::Relaxed);
}

/// Free list owned by one core-local cache
struct LocalCache {
    private: AtomicUsize,      // Single cached address, 0 when empty
    shared: Mutex<Vec<usize>>, // Overflow list, open to stealing
}

impl LocalCache {
    fn new() -> Self {
        Self {
            private: AtomicUsize::new(0),
            shared: Mutex::new(Vec::new()),
        }
    }
}

/// Per-core free list of raw slot addresses
///
/// Only addresses are stored; whatever lives at them is the caller's business.
/// Each thread is pinned to one cache for its whole life, which keeps `put`
/// and the following `get` on the same cache in the common case.
pub struct RecyclePool {
    caches: Box<[CachePadded<LocalCache>]>,
}

impl Default for RecyclePool {
    fn default() -> Self {
        Self::new()
    }
}

impl RecyclePool {
    /// One cache per logical CPU
    pub fn new() -> Self {
        Self::with_caches(num_cpus::get())
    }

    pub fn with_caches(count: usize) -> Self {
        let caches = (0..count.max(1)).map(|_| CachePadded::new(LocalCache::new())).collect();
        Self { caches }
    }

    fn local_index(&self) -> usize {
        THREAD_SLOT.with(|slot| *slot) % self.caches.len()
    }

    /// Return an address to the calling thread's cache
    pub fn put(&self, addr: usize) {
        if addr == 0 {
            return;
        }

        let local = &self.caches[self.local_index()];
        if local.private.compare_exchange(0, addr, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
            return;
        }
        local.shared.lock().push(addr);
    }

    /// Take a cached address: own private slot, own overflow list, then steal
    pub fn get(&self) -> Option<usize> {
        let index = self.local_index();
        let local = &self.caches[index];

        let addr = local.private.swap(0, Ordering::AcqRel);
        if addr != 0 {
            return Some(addr);
        }
        if let Some(addr) = local.shared.lock().pop() {
            return Some(addr);
        }
        self.steal(index)
    }

    fn steal(&self, index: usize) -> Option<usize> {
        let count = self.caches.len();
        for step in 1..count {
            let victim = &self.caches[(index + step) % count];
            if let Some(addr) = victim.shared.lock().pop() {
                return Some(addr);
            }
            let addr = victim.private.swap(0, Ordering::AcqRel);
            if addr != 0 {
                return Some(addr);
            }
        }
        None
    }

    /// `get`, falling back to `factory` when every cache is empty
    pub fn get_or_else<F>(&self, factory: F) -> OffheapResult<usize>
    where
        F: FnOnce() -> OffheapResult<usize>,
    {
        match self.get() {
            Some(addr) => Ok(addr),
            None => factory(),
        }
    }

    /// Approximate number of cached addresses
    pub fn len(&self) -> usize {
        self.caches
            .iter()
            .map(|cache| usize::from(cache.private.load(Ordering::Relaxed) != 0) + cache.shared.lock().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }
}
