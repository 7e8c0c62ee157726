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

//! Off-heap object arena and sharded object tables
//!
//! Fixed-size objects live in anonymous memory segments outside the global
//! allocator. Freed slots are recycled through per-core free lists, and
//! objects are reached through sharded, reference-counted tables keyed by
//! strings, byte arrays or integers.

pub mod chunkmask; // Interval set of valid byte ranges
pub mod config; // Table configuration
pub mod driver; // Table registry
pub mod error; // Error types
pub mod header; // Shared object headers
pub mod key; // Key types and shard selection
pub mod memory; // Arena, recycling and object pools
pub mod table; // Sharded object tables

pub use chunkmask::{ChunkMask, MASK_ARRAY_ELEMENTS_LIMIT, MaskEntry, SharedChunkMask};
pub use config::{OffheapConfig, ReleasePolicy, TableConfig, TableVariant};
pub use driver::{OffheapDriver, TableInfo};
pub use error::{OffheapError, OffheapResult};
pub use header::{HeavyHeader, LightHeader, LivenessGate, ObjectStatus};
pub use key::{Bytes12, Bytes64, Bytes68, KeyType, TableKey};
pub use memory::{Arena, ObjectPool, RecyclePool};
pub use table::{HeavyTable, LightTable, ObjectMut, ObjectRef, ObjectTable, TableSnapshot};
