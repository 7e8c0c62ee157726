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

// Error types shared by the arena, pools and tables

use std::io;

/// Errors produced by the off-heap layer
#[derive(Debug, thiserror::Error)]
pub enum OffheapError {
    #[error("Memory mapping of {size} bytes failed: {source}")]
    Mmap {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown key type: {0}")]
    UnknownKeyType(String),

    #[error("Mask array is full ({0} intervals)")]
    MaskArrayFull(usize),

    #[error("Invalid range: offset {offset} is past end {end}")]
    InvalidRange { offset: i64, end: i64 },

    #[error("Object released more times than it was acquired (accessors = {0})")]
    OverRelease(i32),

    #[error("Table {0} is already registered")]
    TableExists(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for off-heap operations
pub type OffheapResult<T> = std::result::Result<T, OffheapError>;

/// Helper to build a configuration error from anything printable
pub fn invalid_config(msg: impl Into<String>) -> OffheapError {
    OffheapError::InvalidConfiguration(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = OffheapError::InvalidRange { offset: 10, end: 2 };
        assert_eq!(err.to_string(), "Invalid range: offset 10 is past end 2");

        let err = invalid_config("shard_count must be positive");
        assert!(matches!(err, OffheapError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("shard_count"));
    }

    #[test]
    fn test_io_conversion() {
        let err: OffheapError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, OffheapError::Io(_)));
    }
}
