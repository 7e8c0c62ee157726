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

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::memory::PoolSnapshot;

/// Counters kept by an object table
#[derive(Debug)]
pub struct TableStats {
    /// Lookups answered by an existing entry
    pub hits: AtomicU64,
    /// Lookups that found no entry
    pub misses: AtomicU64,
    /// Entries published by get-or-create
    pub creations: AtomicU64,
    /// Speculative slots thrown away after losing a creation race
    pub discarded: AtomicU64,
    /// Entries removed by delete or eager release
    pub deletions: AtomicU64,
    /// Entries removed to make room under the objects limit
    pub evictions: AtomicU64,
}

impl Default for TableStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStats {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            creations: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            deletions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn inc_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_creations(&self) {
        self.creations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deletions(&self) {
        self.deletions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }
}

/// Point-in-time copy of a table's counters and its pool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub name: String,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub creations: u64,
    pub discarded: u64,
    pub deletions: u64,
    pub evictions: u64,
    pub pool: PoolSnapshot,
}

impl TableSnapshot {
    pub(crate) fn capture(name: &str, entries: usize, stats: &TableStats, pool: PoolSnapshot) -> Self {
        Self {
            name: name.to_string(),
            entries,
            hits: stats.hits.load(Ordering::Relaxed),
            misses: stats.misses.load(Ordering::Relaxed),
            hit_ratio: stats.get_hit_ratio(),
            creations: stats.creations.load(Ordering::Relaxed),
            discarded: stats.discarded.load(Ordering::Relaxed),
            deletions: stats.deletions.load(Ordering::Relaxed),
            evictions: stats.evictions.load(Ordering::Relaxed),
            pool,
        }
    }
}
