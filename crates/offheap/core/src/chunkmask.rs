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

//! Interval set tracking which byte ranges of an object are valid
//!
//! Ranges are inclusive on both ends and ranges that touch (`end + 1 ==
//! offset`) are merged, so after every successful merge the stored intervals
//! are pairwise disjoint and non-adjacent. Capacity is fixed; running out of
//! room is reported, never a panic.

use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{OffheapError, OffheapResult};

/// Maximum number of intervals a mask can hold
pub const MASK_ARRAY_ELEMENTS_LIMIT: usize = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaskEntry {
    pub offset: i64,
    pub end: i64,
}

impl MaskEntry {
    pub const fn new(offset: i64, end: i64) -> Self {
        Self { offset, end }
    }
}

impl fmt::Display for MaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.offset, self.end)
    }
}

/// Fixed-capacity set of merged intervals
#[derive(Clone)]
pub struct ChunkMask {
    entries: [MaskEntry; MASK_ARRAY_ELEMENTS_LIMIT],
    len: usize,
}

impl Default for ChunkMask {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChunkMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

impl PartialEq for ChunkMask {
    fn eq(&self, other: &Self) -> bool {
        self.entries() == other.entries()
    }
}

impl Eq for ChunkMask {}

impl ChunkMask {
    pub const fn new() -> Self {
        Self {
            entries: [MaskEntry::new(0, 0); MASK_ARRAY_ELEMENTS_LIMIT],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= MASK_ARRAY_ELEMENTS_LIMIT
    }

    /// Intervals in insertion order
    pub fn entries(&self) -> &[MaskEntry] {
        &self.entries[..self.len]
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Replace the contents with the single interval `[offset, end]`
    pub fn set(&mut self, offset: i64, end: i64) {
        self.entries[0] = MaskEntry::new(offset, end);
        self.len = 1;
    }

    /// True when one stored interval covers all of `[offset, end]`
    pub fn contains(&self, offset: i64, end: i64) -> bool {
        self.entries().iter().any(|entry| offset >= entry.offset && end <= entry.end)
    }

    /// Merge `[offset, end]` into the mask, joining neighbours
    ///
    /// # Returns
    /// * `(merged, success)` - `merged` is true when an existing interval
    ///   absorbed the range, `success` is false only when the range needed a
    ///   new interval and the mask was full.
    pub fn merge_include_neighbour(&mut self, offset: i64, end: i64) -> (bool, bool) {
        let Some(mut merged_into) = self.merge_into_existing(None, offset, end) else {
            if self.is_full() {
                return (false, false);
            }
            self.entries[self.len] = MaskEntry::new(offset, end);
            self.len += 1;
            return (false, true);
        };

        // The grown interval may now reach others; fold it into them until stable.
        loop {
            let grown = self.entries[merged_into];
            let Some(target) = self.merge_into_existing(Some(merged_into), grown.offset, grown.end) else {
                break;
            };
            self.remove(merged_into);
            merged_into = if target > merged_into { target - 1 } else { target };
        }

        (true, true)
    }

    /// Like [`ChunkMask::merge_include_neighbour`] with failures as errors
    pub fn try_merge(&mut self, offset: i64, end: i64) -> OffheapResult<bool> {
        if offset > end {
            return Err(OffheapError::InvalidRange { offset, end });
        }
        match self.merge_include_neighbour(offset, end) {
            (_, false) => Err(OffheapError::MaskArrayFull(self.len)),
            (merged, true) => Ok(merged),
        }
    }

    /// One pass widening every interval the range overlaps or touches
    ///
    /// Returns the index of the last interval that absorbed the range.
    fn merge_into_existing(&mut self, ignore: Option<usize>, offset: i64, end: i64) -> Option<usize> {
        let mut merged_into = None;

        for index in 0..self.len {
            if Some(index) == ignore {
                continue;
            }

            let entry = &mut self.entries[index];
            if entry.end.checked_add(1) == Some(offset) {
                entry.end = offset;
            }
            if entry.offset.checked_sub(1) == Some(end) {
                entry.offset = end;
            }

            if entry.offset <= offset && offset <= entry.end {
                entry.end = entry.end.max(end);
                merged_into = Some(index);
            } else if offset < entry.offset && end >= entry.offset {
                entry.offset = offset;
                entry.end = entry.end.max(end);
                merged_into = Some(index);
            }
        }

        merged_into
    }

    fn remove(&mut self, index: usize) {
        self.entries.copy_within(index + 1..self.len, index);
        self.len -= 1;
    }
}

/// Chunk mask guarded by its own read/write lock
///
/// Merges take the write side; queries share the read side.
#[derive(Debug, Default)]
pub struct SharedChunkMask {
    inner: RwLock<ChunkMask>,
}

impl SharedChunkMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_include_neighbour(&self, offset: i64, end: i64) -> (bool, bool) {
        self.inner.write().merge_include_neighbour(offset, end)
    }

    pub fn try_merge(&self, offset: i64, end: i64) -> OffheapResult<bool> {
        self.inner.write().try_merge(offset, end)
    }

    pub fn contains(&self, offset: i64, end: i64) -> bool {
        self.inner.read().contains(offset, end)
    }

    pub fn set(&self, offset: i64, end: i64) {
        self.inner.write().set(offset, end);
    }

    pub fn reset(&self) {
        self.inner.write().reset();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the current intervals
    pub fn snapshot(&self) -> Vec<MaskEntry> {
        self.inner.read().entries().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entries(mask: &ChunkMask) -> Vec<(i64, i64)> {
        mask.entries().iter().map(|e| (e.offset, e.end)).collect()
    }

    #[test]
    fn test_merge_include_neighbour() {
        let mut mask = ChunkMask::new();
        for (offset, end) in [
            (3, 3),
            (3, 3),
            (10, 20),
            (21, 69),
            (69, 70),
            (70, 70),
            (9, 9),
            (8, 29),
            (100, 300),
            (600, 800),
            (200, 700),
        ] {
            mask.merge_include_neighbour(offset, end);
        }
        assert_eq!(entries(&mask), vec![(3, 3), (8, 70), (100, 800)]);

        assert_eq!(mask.merge_include_neighbour(2, 70000), (true, true));
        assert_eq!(entries(&mask), vec![(2, 70000)]);
    }

    #[test]
    fn test_growing_prefix_collapses() {
        let mut mask = ChunkMask::new();
        for end in [10, 20, 30, 100, 200] {
            mask.merge_include_neighbour(0, end);
        }
        assert_eq!(entries(&mask), vec![(0, 200)]);
    }

    #[test]
    fn test_merge_flags() {
        let mut mask = ChunkMask::new();
        assert_eq!(mask.merge_include_neighbour(0, 9), (false, true));
        assert_eq!(mask.merge_include_neighbour(10, 19), (true, true));
        assert_eq!(mask.merge_include_neighbour(30, 39), (false, true));
        assert_eq!(entries(&mask), vec![(0, 19), (30, 39)]);
    }

    #[test]
    fn test_ranges_at_i64_bounds() {
        let mut mask = ChunkMask::new();
        mask.merge_include_neighbour(i64::MAX - 5, i64::MAX);
        mask.merge_include_neighbour(0, 10);
        mask.merge_include_neighbour(i64::MIN, i64::MIN + 3);
        assert_eq!(entries(&mask), vec![(i64::MAX - 5, i64::MAX), (0, 10), (i64::MIN, i64::MIN + 3)]);

        let mut mask = ChunkMask::new();
        mask.merge_include_neighbour(i64::MAX - 10, i64::MAX - 6);
        assert_eq!(mask.merge_include_neighbour(i64::MAX - 5, i64::MAX), (true, true));
        mask.merge_include_neighbour(i64::MIN, i64::MIN);
        assert_eq!(mask.merge_include_neighbour(i64::MIN + 1, i64::MIN + 2), (true, true));
        assert_eq!(entries(&mask), vec![(i64::MAX - 10, i64::MAX), (i64::MIN, i64::MIN + 2)]);
    }

    #[test]
    fn test_bridge_merges_left_and_right() {
        let mut mask = ChunkMask::new();
        mask.merge_include_neighbour(0, 4);
        mask.merge_include_neighbour(10, 14);
        mask.merge_include_neighbour(20, 24);
        mask.merge_include_neighbour(5, 19);
        assert_eq!(entries(&mask), vec![(0, 24)]);
    }

    #[test]
    fn test_contains() {
        let mut mask = ChunkMask::new();
        mask.merge_include_neighbour(10, 20);
        mask.merge_include_neighbour(40, 50);
        assert!(mask.contains(10, 20));
        assert!(mask.contains(12, 18));
        assert!(!mask.contains(15, 45));
        assert!(!mask.contains(0, 5));
    }

    #[test]
    fn test_set_and_reset() {
        let mut mask = ChunkMask::new();
        mask.merge_include_neighbour(1, 2);
        mask.merge_include_neighbour(10, 20);
        mask.set(0, 4095);
        assert_eq!(entries(&mask), vec![(0, 4095)]);
        mask.reset();
        assert!(mask.is_empty());
        assert!(!mask.contains(0, 0));
    }

    #[test]
    fn test_overflow_keeps_entries() {
        let mut mask = ChunkMask::new();
        for i in 0..MASK_ARRAY_ELEMENTS_LIMIT as i64 {
            assert_eq!(mask.merge_include_neighbour(i * 10, i * 10 + 1), (false, true));
        }
        let before = mask.clone();

        assert_eq!(mask.merge_include_neighbour(100_000, 100_001), (false, false));
        assert_eq!(mask, before);
        assert!(matches!(mask.try_merge(200_000, 200_001), Err(OffheapError::MaskArrayFull(128))));

        // Ranges that fit an existing interval still merge when full
        assert_eq!(mask.merge_include_neighbour(2, 2), (true, true));
        assert_eq!(mask.entries()[0], MaskEntry::new(0, 2));
    }

    #[test]
    fn test_try_merge_rejects_inverted_range() {
        let mut mask = ChunkMask::new();
        assert!(matches!(mask.try_merge(5, 1), Err(OffheapError::InvalidRange { offset: 5, end: 1 })));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_shared_mask_concurrent_merges() {
        let mask = Arc::new(SharedChunkMask::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let mask = Arc::clone(&mask);
                thread::spawn(move || {
                    for i in 0..30i64 {
                        let offset = (i * 4 + t) * 10;
                        mask.merge_include_neighbour(offset, offset + 9);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(mask.snapshot(), vec![MaskEntry::new(0, 1199)]);
        assert!(mask.contains(0, 1199));
    }
}
