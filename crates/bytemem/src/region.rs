// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The storage-agnostic byte region that underpins all public memory types.
//!
//! A region is a `(start, len)` pair over storage kept alive by a [`Holder`]. The storage
//! strategy is chosen when the region is created and is represented by one of the variants
//! of [`Region`]. All bounds checking happens here, before any pointer arithmetic, so the
//! variants only need to describe where their bytes are.

use std::io::Write;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Arc;

use crate::array::ArrayByteMemory;
use crate::holder::Holder;
use crate::raw::RawByteMemory;
use crate::{Error, Result};

/// Size of the intermediate buffer used when streaming writable storage into a writer.
const COPY_CHUNK_SIZE: usize = 8192;

/// The operations a storage variant must provide. Everything else is derived from these.
pub(crate) trait Backing {
    /// Number of addressable bytes.
    fn len(&self) -> usize;

    /// Address of the first addressable byte.
    ///
    /// Valid for reads of `len()` bytes (and for writes, if the holder is writable) for as long
    /// as `holder()` is alive.
    fn start(&self) -> NonNull<u8>;

    /// The keep-alive for the storage.
    fn holder(&self) -> &Arc<Holder>;

    /// Creates a view over `[pos, pos + count)` sharing the same storage.
    ///
    /// The caller guarantees that `count > 0` and that the range is in bounds.
    fn sub_region(&self, pos: usize, count: usize) -> Region;
}

/// A byte region over one of the supported storage strategies.
#[derive(Clone, Debug)]
pub(crate) enum Region {
    Array(ArrayByteMemory),
    Raw(RawByteMemory),
}

impl Backing for Region {
    fn len(&self) -> usize {
        match self {
            Self::Array(array) => array.len(),
            Self::Raw(raw) => raw.len(),
        }
    }

    fn start(&self) -> NonNull<u8> {
        match self {
            Self::Array(array) => array.start(),
            Self::Raw(raw) => raw.start(),
        }
    }

    fn holder(&self) -> &Arc<Holder> {
        match self {
            Self::Array(array) => array.holder(),
            Self::Raw(raw) => raw.holder(),
        }
    }

    fn sub_region(&self, pos: usize, count: usize) -> Region {
        match self {
            Self::Array(array) => array.sub_region(pos, count),
            Self::Raw(raw) => raw.sub_region(pos, count),
        }
    }
}

impl Region {
    /// The canonical empty region. Does not allocate.
    pub(crate) fn empty() -> Self {
        Self::Array(ArrayByteMemory::empty())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_writable(&self) -> bool {
        self.holder().is_writable()
    }

    /// Verifies that `[offset, offset + count)` lies within the region.
    pub(crate) fn check_range(&self, offset: usize, count: usize) -> Result<()> {
        match offset.checked_add(count) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(Error::out_of_range(offset, count, self.len())),
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(Error::invalid_operation("the byte memory is read-only"))
        }
    }

    pub(crate) fn get(&self, index: usize) -> Result<u8> {
        self.check_range(index, 1)?;

        // SAFETY: The index was bounds-checked above and the holder we own keeps the storage alive.
        let ptr = unsafe { self.start().add(index) };

        // SAFETY: The pointer is in bounds. There are no outstanding exclusive references to
        // region storage because writes only ever happen through raw pointers.
        Ok(unsafe { ptr.read() })
    }

    pub(crate) fn set(&self, index: usize, value: u8) -> Result<()> {
        self.check_writable()?;
        self.check_range(index, 1)?;

        // SAFETY: The index was bounds-checked above and the holder we own keeps the storage alive.
        let ptr = unsafe { self.start().add(index) };

        // SAFETY: The storage is writable, so no shared slices over it have been handed out
        // (those only exist for frozen or read-only storage). Writable regions are `!Send`,
        // so no other thread can be accessing the storage concurrently.
        unsafe {
            ptr.write(value);
        }

        Ok(())
    }

    /// Overwrites the bytes at `[pos, pos + src.len())` with `src`.
    pub(crate) fn write_from(&self, pos: usize, src: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.check_range(pos, src.len())?;

        if src.is_empty() {
            return Ok(());
        }

        // SAFETY: The range was bounds-checked above.
        let dst = unsafe { self.start().add(pos) };

        // SAFETY: See `set()` for why writing is permitted. `src` is a caller-owned slice that
        // cannot overlap writable region storage because no slices over such storage exist.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
        }

        Ok(())
    }

    /// Fills `dst` with the bytes starting at `pos`.
    pub(crate) fn read_into(&self, pos: usize, dst: &mut [u8]) -> Result<()> {
        self.check_range(pos, dst.len())?;

        if dst.is_empty() {
            return Ok(());
        }

        // SAFETY: The range was bounds-checked above.
        let src = unsafe { self.start().add(pos) };

        // SAFETY: Source range is in bounds and kept alive by our holder. The destination is an
        // exclusive reference, so it cannot overlap storage that anything may be reading.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), dst.as_mut_ptr(), dst.len());
        }

        Ok(())
    }

    pub(crate) fn read_bytes(&self, pos: usize, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut bytes = vec![0; count];
        self.read_into(pos, &mut bytes)?;
        Ok(bytes)
    }

    pub(crate) fn read_i32(&self, pos: usize) -> Result<i32> {
        let mut bytes = [0; 4];
        self.read_into(pos, &mut bytes)?;
        Ok(i32::from_le_bytes(bytes))
    }

    pub(crate) fn read_u16(&self, pos: usize) -> Result<u16> {
        let mut bytes = [0; 2];
        self.read_into(pos, &mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Decodes `count` bytes at `pos` as UTF-8. Invalid sequences become U+FFFD.
    pub(crate) fn read_utf8_string(&self, pos: usize, count: usize) -> Result<String> {
        if count == 0 {
            return Ok(String::new());
        }

        if self.is_writable() {
            let bytes = self.read_bytes(pos, count)?;
            return Ok(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            });
        }

        self.check_range(pos, count)?;

        // SAFETY: The storage is not writable, so it can never be modified again.
        let bytes = unsafe { self.as_slice_unchecked() };
        Ok(String::from_utf8_lossy(&bytes[pos..pos + count]).into_owned())
    }

    pub(crate) fn slice(&self, pos: usize, count: usize) -> Result<Self> {
        if count == 0 {
            return Ok(Self::empty());
        }

        self.check_range(pos, count)?;
        Ok(self.sub_region(pos, count))
    }

    /// Copies `count` bytes starting at `src_offset` into `dest[dest_offset..]`.
    pub(crate) fn copy(&self, src_offset: usize, dest: &mut [u8], dest_offset: usize, count: usize) -> Result<()> {
        self.check_range(src_offset, count)?;

        let dest_len = dest.len();
        let dest = dest_offset
            .checked_add(count)
            .and_then(|dest_end| dest.get_mut(dest_offset..dest_end))
            .ok_or(Error::out_of_range(dest_offset, count, dest_len))?;

        self.read_into(src_offset, dest)
    }

    /// Streams the whole region into `writer`.
    pub(crate) fn copy_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        if !self.is_writable() {
            // SAFETY: The storage is not writable, so it can never be modified again.
            let bytes = unsafe { self.as_slice_unchecked() };
            writer.write_all(bytes)?;
            return Ok(());
        }

        // The writer is arbitrary code that may hold another alias of this storage and write
        // through it, so we must not hand it a slice over writable storage.
        let mut chunk = [0; COPY_CHUNK_SIZE];
        let mut pos = 0;

        while pos < self.len() {
            let chunk_len = COPY_CHUNK_SIZE.min(self.len() - pos);
            let chunk = &mut chunk[..chunk_len];

            self.read_into(pos, chunk)?;
            writer.write_all(chunk)?;

            pos += chunk_len;
        }

        Ok(())
    }

    pub(crate) fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        self.append_to(&mut bytes);
        bytes
    }

    /// Appends the whole region to the end of `out`.
    pub(crate) fn append_to(&self, out: &mut Vec<u8>) {
        let len = self.len();
        if len == 0 {
            return;
        }

        out.reserve(len);
        let spare = &mut out.spare_capacity_mut()[..len];

        // SAFETY: The source is the whole region, kept alive by our holder. The destination is
        // spare capacity of a vector we have exclusive access to, so it cannot overlap storage
        // that anything may be reading or writing.
        unsafe {
            ptr::copy_nonoverlapping(self.start().as_ptr(), spare.as_mut_ptr().cast::<u8>(), len);
        }

        // SAFETY: We just initialized `len` bytes of spare capacity.
        unsafe {
            out.set_len(out.len() + len);
        }
    }

    /// Returns the region as a byte slice.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that the storage is not writable (i.e. that
    /// `self.is_writable()` is false). Once storage stops being writable it never becomes
    /// writable again, so the slice cannot observe any modification.
    pub(crate) unsafe fn as_slice_unchecked(&self) -> &[u8] {
        debug_assert!(!self.is_writable());

        // SAFETY: The region describes `len()` initialized bytes kept alive by the holder we
        // own for at least as long as `&self`. The caller guarantees immutability.
        unsafe { slice::from_raw_parts(self.start().as_ptr(), self.len()) }
    }
}
