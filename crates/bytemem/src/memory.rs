// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::io::Write;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::array::ArrayByteMemory;
use crate::holder::{Holder, KeepAlive, MemoryGuard};
use crate::raw::RawByteMemory;
use crate::region::{Backing, Region};
use crate::{ByteMemoryStream, ReadOnlyByteMemory, Result};

/// A fixed-length region of bytes, regardless of the storage behind it.
///
/// The storage may be a heap array ([`from_array()`][Self::from_array]), a memory-mapped file
/// ([`from_file()`][Self::from_file]), an anonymous mapping
/// ([`create_memory_mapped_file()`][Self::create_memory_mapped_file]) or memory owned by foreign
/// code ([`from_unsafe_pointer()`][Self::from_unsafe_pointer]). Once created, all of these behave
/// the same: bytes are addressed by index in `[0, len)` and any access outside that range is an
/// error.
///
/// # Sharing
///
/// Cloning and slicing are zero-copy - the result shares storage with the original, so a write
/// through one is visible through the other. Because of this, `ByteMemory` is neither `Send`
/// nor `Sync`: all aliases of some storage live on the thread that created them and writes
/// cannot race with reads.
///
/// To share bytes across threads, call [`as_read_only()`][Self::as_read_only]. This freezes the
/// storage - afterwards, every write through any alias fails with
/// [`Error::InvalidOperation`][crate::Error::InvalidOperation].
///
/// # Example
///
/// ```
/// use bytemem::ByteMemory;
///
/// let mut memory = ByteMemory::from_vec(vec![0x34, 0x12, 0, 0]);
///
/// assert_eq!(memory.read_u16(0)?, 0x1234);
///
/// memory.set(2, 0xFF)?;
/// let tail = memory.slice(2, 2)?;
/// assert_eq!(tail.to_vec(), [0xFF, 0]);
/// # Ok::<(), bytemem::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct ByteMemory {
    region: Region,
}

impl ByteMemory {
    /// Returns an empty byte memory. Does not allocate.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_region(Region::empty())
    }

    /// Creates a byte memory over the window `[offset, offset + len)` of `bytes`.
    ///
    /// The array is not copied. Bytes outside the window are kept alive but are not addressable.
    /// A zero-length window returns [`ByteMemory::empty()`] and releases the array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the window does not fit in `bytes`.
    pub fn from_array(bytes: Vec<u8>, offset: usize, len: usize) -> Result<Self> {
        Ok(Self::from_region(Region::Array(ArrayByteMemory::new(bytes, offset, len, true)?)))
    }

    /// Creates a byte memory over all of `bytes`. The array is not copied.
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::from_region(Region::Array(ArrayByteMemory::whole(bytes, true)))
    }

    /// Creates a byte memory over memory owned by foreign code.
    ///
    /// `holder` is kept alive for as long as the returned value, or any slice, stream or
    /// read-only view derived from it, exists. It is dropped exactly once, after the last of
    /// these is dropped. Use it to release the memory (e.g. via its `Drop` implementation).
    ///
    /// # Safety
    ///
    /// `start` must be valid for reads and writes of `len` bytes until `holder` is dropped,
    /// and nothing other than the returned byte memory (and values derived from it) may access
    /// that memory in the meantime.
    ///
    /// # Example
    ///
    /// ```
    /// use std::ptr::NonNull;
    ///
    /// use bytemem::ByteMemory;
    ///
    /// let mut storage = vec![1_u8, 2, 3];
    /// let start = NonNull::from(storage.as_mut_slice()).cast::<u8>();
    ///
    /// // SAFETY: The vector is moved into the holder, so its buffer outlives the memory.
    /// let memory = unsafe { ByteMemory::from_unsafe_pointer(start, 3, storage) };
    ///
    /// assert_eq!(memory.to_vec(), [1, 2, 3]);
    /// ```
    #[must_use]
    pub unsafe fn from_unsafe_pointer(start: NonNull<u8>, len: usize, holder: impl Any + Send + Sync) -> Self {
        let holder = Holder::new(KeepAlive::External(Box::new(holder)), true);

        // SAFETY: Forwarding the guarantees made by our caller.
        Self::from_region(Region::Raw(unsafe { RawByteMemory::new(start, len, holder) }))
    }

    pub(crate) const fn from_region(region: Region) -> Self {
        Self { region }
    }

    pub(crate) const fn region(&self) -> &Region {
        &self.region
    }

    /// The number of addressable bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Whether the memory has no addressable bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Whether [`set()`][Self::set] and writes through [`as_stream()`][Self::as_stream] are permitted.
    ///
    /// Memory created from a read-only file, and memory whose storage has been frozen by
    /// [`as_read_only()`][Self::as_read_only], is not writable.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.region.is_writable()
    }

    /// Returns the byte at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<u8> {
        self.region.get(index)
    }

    /// Overwrites the byte at `index`.
    ///
    /// The change is visible through every clone and slice sharing this storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`][crate::Error::InvalidOperation] if the memory is not
    /// writable and [`Error::OutOfRange`][crate::Error::OutOfRange] if `index >= len()`.
    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        self.region.set(index, value)
    }

    /// Returns a copy of `count` bytes starting at `pos`.
    ///
    /// A `count` of zero always succeeds with an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the range is not within the memory.
    pub fn read_bytes(&self, pos: usize, count: usize) -> Result<Vec<u8>> {
        self.region.read_bytes(pos, count)
    }

    /// Decodes a little-endian `i32` starting at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if fewer than 4 bytes are available at `pos`.
    pub fn read_i32(&self, pos: usize) -> Result<i32> {
        self.region.read_i32(pos)
    }

    /// Decodes a little-endian `u16` starting at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if fewer than 2 bytes are available at `pos`.
    pub fn read_u16(&self, pos: usize) -> Result<u16> {
        self.region.read_u16(pos)
    }

    /// Decodes `count` bytes starting at `pos` as UTF-8 text.
    ///
    /// Invalid sequences are replaced with U+FFFD. A `count` of zero yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the range is not within the memory.
    pub fn read_utf8_string(&self, pos: usize, count: usize) -> Result<String> {
        self.region.read_utf8_string(pos, count)
    }

    /// Returns a view over `count` bytes starting at `pos`, sharing storage with `self`.
    ///
    /// A `count` of zero returns an empty memory that does not keep the storage alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the range is not within the memory.
    pub fn slice(&self, pos: usize, count: usize) -> Result<Self> {
        self.region.slice(pos, count).map(Self::from_region)
    }

    /// Writes the entire contents of the memory into `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`][crate::Error::Io] if the writer fails.
    pub fn copy_to(&self, writer: &mut (impl Write + ?Sized)) -> Result<()> {
        self.region.copy_to(writer)
    }

    /// Copies `count` bytes starting at `src_offset` into `dest`, starting at `dest_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if either the source or the
    /// destination range is out of bounds. Nothing is copied in that case.
    pub fn copy(&self, src_offset: usize, dest: &mut [u8], dest_offset: usize, count: usize) -> Result<()> {
        self.region.copy(src_offset, dest, dest_offset, count)
    }

    /// Returns a copy of the entire contents of the memory.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.region.to_vec()
    }

    /// Returns an adapter that reads, writes and seeks within the memory via `std::io` traits.
    ///
    /// The stream shares storage with `self` and keeps it alive until dropped.
    #[must_use]
    pub fn as_stream(&self) -> ByteMemoryStream {
        ByteMemoryStream::new(self.region.clone(), true)
    }

    /// Returns an adapter that reads and seeks within the memory via `std::io` traits.
    ///
    /// Writing through the returned stream always fails. Unlike
    /// [`as_read_only()`][Self::as_read_only], this does not freeze the storage.
    #[must_use]
    pub fn as_read_only_stream(&self) -> ByteMemoryStream {
        ByteMemoryStream::new(self.region.clone(), false)
    }

    /// Returns a read-only view of the memory that may be shared across threads.
    ///
    /// This permanently freezes the storage: afterwards, writes through `self` or any other
    /// value sharing the storage fail.
    #[must_use]
    pub fn as_read_only(&self) -> ReadOnlyByteMemory {
        ReadOnlyByteMemory::new(self.clone())
    }

    /// Keeps the storage alive for as long as the returned guard exists, even if every byte
    /// memory referencing it is dropped.
    pub fn extend_lifetime(&self) -> MemoryGuard {
        MemoryGuard::new(Arc::clone(self.region.holder()))
    }
}

impl Default for ByteMemory {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<u8>> for ByteMemory {
    /// Converts a [`Vec<u8>`] into a `ByteMemory` without copying.
    fn from(value: Vec<u8>) -> Self {
        Self::from_vec(value)
    }
}
