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

use std::io;
use std::ptr::{self, NonNull};

use tracing::warn;

use crate::error::{OffheapError, OffheapResult, invalid_config};
use crate::memory::lib::{align_to, get_page_size};

/// Private read-write anonymous mapping
///
/// The memory is zero-filled by the kernel and unmapped on drop. It never
/// moves, so raw pointers into it stay valid for the lifetime of the map.
pub struct AnonymousMap {
    ptr: NonNull<u8>, // Start of the mapped region
    len: usize,       // Requested length
    mapped: usize,    // Page-aligned length actually mapped
}

// The map is a plain region of bytes; synchronisation is up to its users.
unsafe impl Send for AnonymousMap {}
unsafe impl Sync for AnonymousMap {}

impl AnonymousMap {
    /// Map `size` bytes of anonymous memory
    ///
    /// # Arguments
    /// * `size` - Number of usable bytes, rounded up to whole pages internally
    ///
    /// # Returns
    /// * `OffheapResult<Self>` - The mapping, or `OffheapError::Mmap` when the kernel refuses it
    pub fn new(size: usize) -> OffheapResult<Self> {
        if size == 0 {
            return Err(invalid_config("mapping size must be positive"));
        }

        let mapped = align_to(size, get_page_size());
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(OffheapError::Mmap {
                size: mapped,
                source: io::Error::last_os_error(),
            });
        }

        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| OffheapError::Mmap {
            size: mapped,
            source: io::Error::other("mmap returned a null mapping"),
        })?;

        Ok(Self { ptr, len: size, mapped })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `addr` falls inside the usable part of the mapping
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.ptr.as_ptr() as usize;
        addr >= start && addr < start + self.len
    }
}

impl Drop for AnonymousMap {
    fn drop(&mut self) {
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.mapped) };
        if result != 0 {
            warn!(addr = ?self.ptr, len = self.mapped, error = %io::Error::last_os_error(), "failed to unmap segment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_mapping() {
        let map = AnonymousMap::new(1000).unwrap();
        assert_eq!(map.len(), 1000);
        assert!(!map.is_empty());
        assert_eq!(map.as_ptr() as usize % get_page_size(), 0);
    }

    #[test]
    fn test_mapping_is_zeroed_and_writable() {
        let map = AnonymousMap::new(4096).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts_mut(map.as_ptr(), map.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
        bytes[4095] = 0xAB;
        assert_eq!(bytes[4095], 0xAB);
    }

    #[test]
    fn test_contains() {
        let map = AnonymousMap::new(64).unwrap();
        let start = map.as_ptr() as usize;
        assert!(map.contains(start));
        assert!(map.contains(start + 63));
        assert!(!map.contains(start + 64));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(AnonymousMap::new(0), Err(OffheapError::InvalidConfiguration(_))));
    }
}
