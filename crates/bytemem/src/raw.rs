// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;
use std::sync::Arc;

use memmap2::{Mmap, MmapMut};

use crate::holder::{Holder, KeepAlive};
use crate::region::{Backing, Region};
use crate::{Error, Result};

/// A region of memory that is not owned by the Rust allocator, e.g. a memory mapping or an
/// allocation made by foreign code.
///
/// The start address is only valid while the holder is alive. Slices re-share the same
/// holder, so the keep-alive chain is preserved no matter how many times a region is sliced.
#[derive(Clone, Debug)]
pub(crate) struct RawByteMemory {
    start: NonNull<u8>,
    len: usize,
    holder: Arc<Holder>,
}

impl RawByteMemory {
    /// # Safety
    ///
    /// `start` must be valid for reads of `len` bytes for as long as `holder` is alive, and for
    /// writes as well if `holder` is writable. Nothing outside of regions sharing `holder` may
    /// access the memory during that time.
    pub(crate) const unsafe fn new(start: NonNull<u8>, len: usize, holder: Arc<Holder>) -> Self {
        Self { start, len, holder }
    }

    /// Creates a region over a read-only mapping, taking ownership of the mapping.
    pub(crate) fn from_mapping(map: Mmap) -> Result<Region> {
        if map.is_empty() {
            return Ok(Region::empty());
        }

        let start = NonNull::new(map.as_ptr().cast_mut()).ok_or_else(null_mapping)?;
        let len = map.len();
        let holder = Holder::new(KeepAlive::Mapped(map), false);

        // SAFETY: The mapping covers `len` readable bytes and lives in the holder, which is
        // never writable. Moving an `Mmap` does not move the mapped memory.
        Ok(Region::Raw(unsafe { Self::new(start, len, holder) }))
    }

    /// Creates a region over a writable mapping, taking ownership of the mapping.
    ///
    /// If `writable` is false, the region will refuse writes even though the mapping permits them.
    pub(crate) fn from_mapping_mut(mut map: MmapMut, writable: bool) -> Result<Region> {
        if map.is_empty() {
            return Ok(Region::empty());
        }

        let start = NonNull::new(map.as_mut_ptr()).ok_or_else(null_mapping)?;
        let len = map.len();
        let holder = Holder::new(KeepAlive::MappedMut(map), writable);

        // SAFETY: The mapping covers `len` readable and writable bytes and lives in the holder.
        // Moving an `MmapMut` does not move the mapped memory.
        Ok(Region::Raw(unsafe { Self::new(start, len, holder) }))
    }
}

fn null_mapping() -> Error {
    Error::invalid_operation("the memory mapping has a null address")
}

impl Backing for RawByteMemory {
    fn len(&self) -> usize {
        self.len
    }

    fn start(&self) -> NonNull<u8> {
        self.start
    }

    fn holder(&self) -> &Arc<Holder> {
        &self.holder
    }

    fn sub_region(&self, pos: usize, count: usize) -> Region {
        debug_assert!(count > 0 && pos + count <= self.len);

        // SAFETY: The caller guarantees the range is within this region.
        let start = unsafe { self.start.add(pos) };

        // SAFETY: The new range is a subset of ours and shares our holder, so every guarantee
        // made for our range also holds for the new one.
        Region::Raw(unsafe { Self::new(start, count, Arc::clone(&self.holder)) })
    }
}
