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

use std::fmt;
use std::marker::PhantomData;

use crate::error::OffheapResult;
use crate::header::{HeavyHeader, LightHeader, LivenessGate};
use crate::key::TableKey;
use crate::table::ObjectTable;
use crate::table::slot::Slot;

/// Shared acquisition of a table object, released on drop
///
/// Heavy handles exclude writers for their whole life. Light handles only keep
/// the slot alive; their payload accessors are unsafe because other holders
/// may write concurrently.
pub struct ObjectRef<'a, K: TableKey, G: LivenessGate> {
    table: &'a ObjectTable<K, G>,
    slot: Slot,
    released: bool,
    // The gate must be left on the thread that entered it.
    _not_send: PhantomData<*const ()>,
}

impl<'a, K: TableKey, G: LivenessGate> ObjectRef<'a, K, G> {
    pub(crate) fn new(table: &'a ObjectTable<K, G>, slot: Slot) -> Self {
        Self {
            table,
            slot,
            released: false,
            _not_send: PhantomData,
        }
    }

    pub fn key(&self) -> &K {
        self.table.slot_key(self.slot)
    }

    /// Current number of holders, this one included
    pub fn accessors(&self) -> i32 {
        self.table.slot_accessors(self.slot)
    }

    /// Address of the payload, stable for the life of the handle
    pub fn as_ptr(&self) -> *const u8 {
        self.table.payload_ptr(self.slot)
    }

    pub fn len(&self) -> usize {
        self.table.object_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release now, reporting an over-release instead of only logging it
    pub fn release(mut self) -> OffheapResult<()> {
        self.released = true;
        self.table.release_handle(self.slot, false)
    }
}

impl<K: TableKey> ObjectRef<'_, K, HeavyHeader> {
    pub fn payload(&self) -> &[u8] {
        // The shared gate keeps writers out.
        unsafe { self.table.payload(self.slot) }
    }
}

impl<K: TableKey> ObjectRef<'_, K, LightHeader> {
    /// # Safety
    /// Light objects have no gate: the caller must make sure nobody writes the
    /// payload while the returned slice is alive.
    pub unsafe fn payload(&self) -> &[u8] {
        unsafe { self.table.payload(self.slot) }
    }

    /// # Safety
    /// The caller must make sure nobody else reads or writes the payload while
    /// the returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn payload_mut(&self) -> &mut [u8] {
        unsafe { self.table.payload_mut(self.slot) }
    }
}

impl<K: TableKey, G: LivenessGate> Drop for ObjectRef<'_, K, G> {
    fn drop(&mut self) {
        if !self.released {
            // Over-release is already logged by the table.
            let _ = self.table.release_handle(self.slot, false);
        }
    }
}

impl<K: TableKey, G: LivenessGate> fmt::Debug for ObjectRef<'_, K, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("table", &self.table.name())
            .field("key", self.key())
            .field("accessors", &self.accessors())
            .finish()
    }
}

/// Exclusive acquisition of a table object, released on drop
pub struct ObjectMut<'a, K: TableKey, G: LivenessGate> {
    table: &'a ObjectTable<K, G>,
    slot: Slot,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a, K: TableKey, G: LivenessGate> ObjectMut<'a, K, G> {
    pub(crate) fn new(table: &'a ObjectTable<K, G>, slot: Slot) -> Self {
        Self {
            table,
            slot,
            released: false,
            _not_send: PhantomData,
        }
    }

    pub fn key(&self) -> &K {
        self.table.slot_key(self.slot)
    }

    pub fn accessors(&self) -> i32 {
        self.table.slot_accessors(self.slot)
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.table.payload_ptr(self.slot)
    }

    pub fn len(&self) -> usize {
        self.table.object_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn release(mut self) -> OffheapResult<()> {
        self.released = true;
        self.table.release_handle(self.slot, true)
    }
}

impl<K: TableKey> ObjectMut<'_, K, HeavyHeader> {
    pub fn payload(&self) -> &[u8] {
        unsafe { self.table.payload(self.slot) }
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        // Exclusive gate held, and `&mut self` keeps this slice unique.
        unsafe { self.table.payload_mut(self.slot) }
    }
}

impl<K: TableKey> ObjectMut<'_, K, LightHeader> {
    /// # Safety
    /// See [`ObjectRef::payload_mut`]; a light write handle excludes nobody.
    pub unsafe fn payload_mut(&mut self) -> &mut [u8] {
        unsafe { self.table.payload_mut(self.slot) }
    }
}

impl<K: TableKey, G: LivenessGate> Drop for ObjectMut<'_, K, G> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.table.release_handle(self.slot, true);
        }
    }
}

impl<K: TableKey, G: LivenessGate> fmt::Debug for ObjectMut<'_, K, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectMut")
            .field("table", &self.table.name())
            .field("key", self.key())
            .field("accessors", &self.accessors())
            .finish()
    }
}
