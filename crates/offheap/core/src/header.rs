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

//! Shared object headers
//!
//! Every table slot starts with a header deciding who may touch the payload
//! and when the slot may be recycled. [`HeavyHeader`] tracks a lifecycle
//! status behind a read/write gate; [`LightHeader`] is a bare accessor count.
//! Tables are generic over [`LivenessGate`] so both share one implementation.

use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RawRwLock;
use parking_lot::lock_api::{RawRwLock as _, RawRwLockDowngrade as _};

use crate::config::TableVariant;

/// Lifecycle of a heavy object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ObjectStatus {
    Uninitialized = 0,
    Initialized = 1,
    Releasable = 2,
    Released = 3,
}

impl ObjectStatus {
    fn from_raw(raw: i32) -> Self {
        match raw {
            1 => ObjectStatus::Initialized,
            2 => ObjectStatus::Releasable,
            3 => ObjectStatus::Released,
            _ => ObjectStatus::Uninitialized,
        }
    }
}

/// Operations a table needs from a slot header
///
/// The accessor count is split from the gate: tables `pin` an object while
/// holding the shard lock, then take the gate after dropping it. Every `pin`
/// is balanced by exactly one `release_*` (or `unpin`). The `release_*`
/// methods return the resulting accessor count; a count of `-1` means the
/// object has left its table and the caller was the last holder.
pub trait LivenessGate: Send + Sync + Sized + 'static {
    /// Whether write acquisitions exclude readers
    const EXCLUSIVE_GATE: bool;
    /// Configuration name of this header kind
    const VARIANT: TableVariant;

    /// A fresh header: no accessors, not initialized
    fn new() -> Self;

    /// Count one more holder
    fn pin(&self);

    /// Drop one holder without touching the gate, returning the new count
    fn unpin(&self) -> i32;

    /// Take the shared side of the gate on a pinned object; true when it is live
    fn try_acquire_read(&self) -> bool;

    /// Take the exclusive side of the gate on a pinned object; true when it is live
    fn try_acquire_write(&self) -> bool;

    /// Leave the shared side and drop the holder
    fn release_read(&self) -> i32;

    /// Leave the exclusive side and drop the holder
    fn release_write(&self) -> i32;

    /// Turn an exclusive acquisition into a shared one
    fn downgrade(&self);

    fn is_live(&self) -> bool;

    fn complete_init(&self);

    fn mark_for_release(&self);

    /// Claim the physical release; at most one caller ever wins
    fn try_finalize_release(&self) -> bool;

    fn reset(&self);

    fn accessors(&self) -> i32;
}

/// Status-tracked header with a read/write gate
#[repr(C)]
pub struct HeavyHeader {
    gate: RawRwLock,
    accessors: AtomicI32,
    status: AtomicI32,
}

impl Default for HeavyHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl HeavyHeader {
    pub const fn new() -> Self {
        Self {
            gate: RawRwLock::INIT,
            accessors: AtomicI32::new(0),
            status: AtomicI32::new(ObjectStatus::Uninitialized as i32),
        }
    }

    pub fn status(&self) -> ObjectStatus {
        ObjectStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    pub fn complete_init(&self) {
        self.status.store(ObjectStatus::Initialized as i32, Ordering::Release);
    }

    pub fn set_releasable(&self) {
        self.status.store(ObjectStatus::Releasable as i32, Ordering::Release);
    }

    /// Releasable -> Released; true for the single caller that made the move
    pub fn ensure_release(&self) -> bool {
        self.status
            .compare_exchange(
                ObjectStatus::Releasable as i32,
                ObjectStatus::Released as i32,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn read_acquire(&self) {
        self.accessors.fetch_add(1, Ordering::AcqRel);
        self.gate.lock_shared();
    }

    pub fn read_release(&self) -> i32 {
        // Only called by a holder of the shared side.
        unsafe { self.gate.unlock_shared() };
        self.accessors.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn write_acquire(&self) {
        self.accessors.fetch_add(1, Ordering::AcqRel);
        self.gate.lock_exclusive();
    }

    /// Exclusive acquisition without blocking; the count is untouched on failure
    pub fn try_write_acquire(&self) -> bool {
        if self.gate.try_lock_exclusive() {
            self.accessors.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    pub fn write_release(&self) -> i32 {
        // Only called by the holder of the exclusive side.
        unsafe { self.gate.unlock_exclusive() };
        self.accessors.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn reset(&self) {
        self.accessors.store(0, Ordering::Release);
        self.status.store(ObjectStatus::Uninitialized as i32, Ordering::Release);
    }

    pub fn accessors(&self) -> i32 {
        self.accessors.load(Ordering::Acquire)
    }
}

impl LivenessGate for HeavyHeader {
    const EXCLUSIVE_GATE: bool = true;
    const VARIANT: TableVariant = TableVariant::Heavy;

    fn new() -> Self {
        HeavyHeader::new()
    }

    fn pin(&self) {
        self.accessors.fetch_add(1, Ordering::AcqRel);
    }

    fn unpin(&self) -> i32 {
        self.accessors.fetch_sub(1, Ordering::AcqRel) - 1
    }

    fn try_acquire_read(&self) -> bool {
        self.gate.lock_shared();
        self.is_live()
    }

    fn try_acquire_write(&self) -> bool {
        self.gate.lock_exclusive();
        self.is_live()
    }

    fn release_read(&self) -> i32 {
        self.read_release()
    }

    fn release_write(&self) -> i32 {
        self.write_release()
    }

    fn downgrade(&self) {
        // The table only downgrades an exclusive acquisition it holds.
        unsafe { self.gate.downgrade() };
    }

    fn is_live(&self) -> bool {
        self.status() == ObjectStatus::Initialized
    }

    fn complete_init(&self) {
        HeavyHeader::complete_init(self);
    }

    fn mark_for_release(&self) {
        self.set_releasable();
    }

    fn try_finalize_release(&self) -> bool {
        self.ensure_release()
    }

    fn reset(&self) {
        HeavyHeader::reset(self);
    }

    fn accessors(&self) -> i32 {
        HeavyHeader::accessors(self)
    }
}

/// Bare accessor count; holders tolerate concurrent payload mutation
#[repr(C)]
pub struct LightHeader {
    accessors: AtomicI32,
}

impl Default for LightHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl LightHeader {
    pub const fn new() -> Self {
        Self { accessors: AtomicI32::new(0) }
    }

    /// Returns the count after the increment
    pub fn acquire(&self) -> i32 {
        self.accessors.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the count after the decrement
    pub fn release(&self) -> i32 {
        self.accessors.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn reset(&self) {
        self.accessors.store(0, Ordering::Release);
    }

    pub fn accessors(&self) -> i32 {
        self.accessors.load(Ordering::Acquire)
    }
}

impl LivenessGate for LightHeader {
    const EXCLUSIVE_GATE: bool = false;
    const VARIANT: TableVariant = TableVariant::Light;

    fn new() -> Self {
        LightHeader::new()
    }

    fn pin(&self) {
        self.acquire();
    }

    fn unpin(&self) -> i32 {
        self.release()
    }

    // Presence in the shard map is all the validation a light object gets.
    fn try_acquire_read(&self) -> bool {
        true
    }

    fn try_acquire_write(&self) -> bool {
        true
    }

    fn release_read(&self) -> i32 {
        self.release()
    }

    fn release_write(&self) -> i32 {
        self.release()
    }

    fn downgrade(&self) {}

    fn is_live(&self) -> bool {
        true
    }

    fn complete_init(&self) {}

    fn mark_for_release(&self) {}

    fn try_finalize_release(&self) -> bool {
        true
    }

    fn reset(&self) {
        LightHeader::reset(self);
    }

    fn accessors(&self) -> i32 {
        LightHeader::accessors(self)
    }
}
