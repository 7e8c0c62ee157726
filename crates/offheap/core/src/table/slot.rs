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

use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};

use crate::header::LivenessGate;
use crate::key::TableKey;
use crate::memory::lib::align_to;

/// Minimum alignment of every slot and payload
const SLOT_ALIGN: usize = 8;

/// In-slot header: liveness gate followed by the owning key
#[repr(C)]
pub(crate) struct SlotHeader<K, G> {
    pub(crate) gate: G,
    pub(crate) key: MaybeUninit<K>,
}

/// Address of one slot, as stored in a shard map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot(NonNull<u8>);

// A slot is an address into arena memory that outlives every table entry.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    pub(crate) fn new(addr: NonNull<u8>) -> Self {
        Self(addr)
    }

    pub(crate) fn addr(self) -> NonNull<u8> {
        self.0
    }
}

/// Where the header and payload sit inside a slot
pub(crate) struct SlotLayout<K, G> {
    pub(crate) payload_offset: usize,
    pub(crate) payload_size: usize,
    pub(crate) slot_size: usize,
    _marker: PhantomData<fn() -> (K, G)>,
}

impl<K: TableKey, G: LivenessGate> SlotLayout<K, G> {
    pub(crate) fn new(payload_size: usize) -> Self {
        let align = mem::align_of::<SlotHeader<K, G>>().max(SLOT_ALIGN);
        let payload_offset = align_to(mem::size_of::<SlotHeader<K, G>>(), align);
        let slot_size = align_to(payload_offset + payload_size, align);
        Self {
            payload_offset,
            payload_size,
            slot_size,
            _marker: PhantomData,
        }
    }

    fn header_ptr(&self, slot: Slot) -> *mut SlotHeader<K, G> {
        slot.addr().as_ptr() as *mut SlotHeader<K, G>
    }

    /// Write a fresh header owning `key` into a slot nobody else can see yet
    ///
    /// # Safety
    /// The slot must come from the table's pool and hold no initialized key.
    pub(crate) unsafe fn init(&self, slot: Slot, key: K) {
        unsafe {
            ptr::write(
                self.header_ptr(slot),
                SlotHeader {
                    gate: G::new(),
                    key: MaybeUninit::new(key),
                },
            )
        };
    }

    /// # Safety
    /// The slot header must have been written by [`SlotLayout::init`].
    pub(crate) unsafe fn gate<'a>(&self, slot: Slot) -> &'a G {
        unsafe { &(*self.header_ptr(slot)).gate }
    }

    /// # Safety
    /// The caller pins the slot, or holds the shard lock of a mapped slot, so
    /// the key cannot be dropped while the reference lives.
    pub(crate) unsafe fn key<'a>(&self, slot: Slot) -> &'a K {
        unsafe { (*self.header_ptr(slot)).key.assume_init_ref() }
    }

    /// Drop the key in place before the slot is recycled
    ///
    /// # Safety
    /// No other reference to the key may exist, and it must be dropped once.
    pub(crate) unsafe fn drop_key(&self, slot: Slot) {
        unsafe { (*self.header_ptr(slot)).key.assume_init_drop() };
    }

    pub(crate) fn payload_ptr(&self, slot: Slot) -> *mut u8 {
        // payload_offset + payload_size never exceeds slot_size
        unsafe { slot.addr().as_ptr().add(self.payload_offset) }
    }
}
