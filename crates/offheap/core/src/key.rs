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

// Table key types and shard selection

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OffheapError;

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over a byte sequence
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Key kinds a table can be configured with
///
/// Parsed from and rendered as `string`, `int32`, `int64`, `uint64` or `bytesN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyType {
    String,
    Int32,
    Int64,
    Uint64,
    /// Fixed-size byte array of the given length
    Bytes(usize),
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::String => write!(f, "string"),
            KeyType::Int32 => write!(f, "int32"),
            KeyType::Int64 => write!(f, "int64"),
            KeyType::Uint64 => write!(f, "uint64"),
            KeyType::Bytes(len) => write!(f, "bytes{len}"),
        }
    }
}

impl FromStr for KeyType {
    type Err = OffheapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(KeyType::String),
            "int32" => Ok(KeyType::Int32),
            "int64" => Ok(KeyType::Int64),
            "uint64" => Ok(KeyType::Uint64),
            other => other
                .strip_prefix("bytes")
                .and_then(|len| len.parse::<usize>().ok())
                .filter(|&len| len > 0)
                .map(KeyType::Bytes)
                .ok_or_else(|| OffheapError::UnknownKeyType(other.to_string())),
        }
    }
}

impl TryFrom<String> for KeyType {
    type Error = OffheapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyType> for String {
    fn from(value: KeyType) -> Self {
        value.to_string()
    }
}

/// A key usable by [`crate::table::ObjectTable`]
///
/// Keys are cloned into the slot header so a stale handle can be told apart
/// from the entry that replaced it.
pub trait TableKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {
    /// The configuration name of this key kind
    fn key_type() -> KeyType;

    /// Index of the shard owning this key, always below `shard_count`
    fn shard_index(&self, shard_count: usize) -> usize;
}

impl TableKey for String {
    fn key_type() -> KeyType {
        KeyType::String
    }

    fn shard_index(&self, shard_count: usize) -> usize {
        fnv1a32(self.as_bytes()) as usize % shard_count
    }
}

impl<const N: usize> TableKey for [u8; N] {
    fn key_type() -> KeyType {
        KeyType::Bytes(N)
    }

    fn shard_index(&self, shard_count: usize) -> usize {
        fnv1a32(self) as usize % shard_count
    }
}

// Integer keys shard by value; rem_euclid keeps negative keys in range.
macro_rules! impl_signed_key {
    ($ty:ty, $kind:expr) => {
        impl TableKey for $ty {
            fn key_type() -> KeyType {
                $kind
            }

            fn shard_index(&self, shard_count: usize) -> usize {
                (*self as i64).rem_euclid(shard_count as i64) as usize
            }
        }
    };
}

impl_signed_key!(i32, KeyType::Int32);
impl_signed_key!(i64, KeyType::Int64);

impl TableKey for u64 {
    fn key_type() -> KeyType {
        KeyType::Uint64
    }

    fn shard_index(&self, shard_count: usize) -> usize {
        (*self % shard_count as u64) as usize
    }
}

/// 12-byte identifiers
pub type Bytes12 = [u8; 12];
/// 64-byte identifiers
pub type Bytes64 = [u8; 64];
/// 68-byte identifiers
pub type Bytes68 = [u8; 68];
