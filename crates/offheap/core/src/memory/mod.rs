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

/// Off-heap memory management
///
/// Slots are bump-allocated out of anonymous mappings and recycled through
/// per-core free lists, never handed back to the operating system:
/// - Anonymous memory segments
/// - Bump arena with double-checked growth
/// - Per-core recycling pool with cross-core stealing
/// - Object pool with a soft objects limit and eviction
pub mod arena; // Segment list and bump cursor
pub mod lib; // Alignment and page-size helpers
pub mod mmap; // Anonymous memory mappings
pub mod object_pool; // Arena + recycler behind alloc/release
pub mod recycle; // Per-core free lists

pub use arena::Arena;
pub use lib::{align_to, get_page_size};
pub use mmap::AnonymousMap;
pub use object_pool::{EvictFn, ObjectPool, PoolSnapshot, PoolStats, PrepareSlotFn};
pub use recycle::RecyclePool;
