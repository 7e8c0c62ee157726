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

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{OffheapResult, invalid_config};
use crate::memory::mmap::AnonymousMap;

/// Slots per segment when the owner sets no objects limit
const UNBOUNDED_SLOTS_PER_SEGMENT: usize = 1024;
/// A bounded arena is split into this many segments
const BOUNDED_SEGMENTS: usize = 16;

/// One mapping plus its bump cursor
struct Segment {
    map: AnonymousMap,
    cursor: AtomicUsize, // Offset of the next free slot
}

impl Segment {
    fn map(bytes: usize) -> OffheapResult<Self> {
        Ok(Self {
            map: AnonymousMap::new(bytes)?,
            cursor: AtomicUsize::new(0),
        })
    }
}

/// Append-only list of segments handing out fixed-size slots
///
/// Slots are never freed individually; all segments are unmapped together
/// when the arena is dropped.
pub struct Arena {
    slot_size: usize,
    per_segment_bytes: usize,
    current: AtomicPtr<Segment>,       // Segment currently bumped from
    segments: Mutex<Vec<Box<Segment>>>, // Serializes growth, owns every segment
    bumped: AtomicU64,
}

impl Arena {
    /// Create an arena and map its first segment
    ///
    /// # Arguments
    /// * `slot_size` - Size of every slot handed out by `bump`
    /// * `objects_limit` - Expected maximum number of live slots, `None` when unbounded
    pub fn new(slot_size: usize, objects_limit: Option<usize>) -> OffheapResult<Self> {
        if slot_size == 0 {
            return Err(invalid_config("slot size must be positive"));
        }

        let slots_per_segment = match objects_limit {
            None => UNBOUNDED_SLOTS_PER_SEGMENT,
            Some(limit) => limit.div_ceil(BOUNDED_SEGMENTS).max(1),
        };
        let per_segment_bytes = slots_per_segment
            .checked_mul(slot_size)
            .ok_or_else(|| invalid_config(format!("segment of {slots_per_segment} slots of {slot_size} bytes overflows")))?;

        let mut first = Box::new(Segment::map(per_segment_bytes)?);
        let current = AtomicPtr::new(&mut *first as *mut Segment);

        Ok(Self {
            slot_size,
            per_segment_bytes,
            current,
            segments: Mutex::new(vec![first]),
            bumped: AtomicU64::new(0),
        })
    }

    /// Hand out the next unused slot
    ///
    /// Maps a new segment when the current one is exhausted. Only the first
    /// thread to observe exhaustion grows the arena; the others retry on the
    /// segment it installed.
    pub fn bump(&self) -> OffheapResult<NonNull<u8>> {
        loop {
            let segment_ptr = self.current.load(Ordering::Acquire);
            // Segments are boxed and only dropped with the arena.
            let segment = unsafe { &*segment_ptr };

            let offset = segment.cursor.fetch_add(self.slot_size, Ordering::Relaxed);
            if offset + self.slot_size <= self.per_segment_bytes {
                self.bumped.fetch_add(1, Ordering::Relaxed);
                let addr = unsafe { segment.map.as_ptr().add(offset) };
                // Inside a live mapping, never null.
                return Ok(unsafe { NonNull::new_unchecked(addr) });
            }

            self.grow(segment_ptr)?;
        }
    }

    fn grow(&self, exhausted: *mut Segment) -> OffheapResult<()> {
        let mut segments = self.segments.lock();
        if !ptr::eq(self.current.load(Ordering::Acquire), exhausted) {
            return Ok(());
        }

        let mut segment = Box::new(Segment::map(self.per_segment_bytes)?);
        self.current.store(&mut *segment as *mut Segment, Ordering::Release);
        segments.push(segment);
        debug!(segments = segments.len(), bytes = self.per_segment_bytes, "arena grew");
        Ok(())
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn per_segment_bytes(&self) -> usize {
        self.per_segment_bytes
    }

    pub fn segment_count(&self) -> usize {
        self.segments.lock().len()
    }

    /// Number of slots handed out by `bump` so far
    pub fn bumped(&self) -> u64 {
        self.bumped.load(Ordering::Relaxed)
    }

    /// Whether `addr` is the start of a slot owned by this arena
    pub fn owns(&self, addr: usize) -> bool {
        self.segments.lock().iter().any(|segment| {
            let start = segment.map.as_ptr() as usize;
            segment.map.contains(addr) && (addr - start) % self.slot_size == 0
        })
    }
}
