// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;

use crate::holder::MemoryGuard;
use crate::region::{Backing, Region};
use crate::{ByteMemory, ReadOnlyByteMemoryStream, Result};

/// An immutable view over byte memory that may be shared between threads.
///
/// Obtain one via [`ByteMemory::as_read_only()`] or directly from a `Vec<u8>`. Creating a
/// read-only view freezes the underlying storage, so the bytes can never change while any
/// read-only view exists. This makes it safe to hand out plain `&[u8]` access via
/// [`as_slice()`][Self::as_slice] and to read the same bytes from many threads at once, e.g.
/// with several [`ByteStream`][crate::ByteStream] cursors over different sub-regions.
///
/// Cloning and slicing are zero-copy.
#[derive(Clone, Debug)]
pub struct ReadOnlyByteMemory {
    inner: ByteMemory,
}

// SAFETY: The storage is frozen before a `ReadOnlyByteMemory` is created and can never be written
// again, so concurrent access only ever reads. The storage itself is kept alive by an
// `Arc<Holder>`, which is thread-safe.
unsafe impl Send for ReadOnlyByteMemory {}

// SAFETY: See the `Send` implementation above - all access through `&Self` is read-only.
unsafe impl Sync for ReadOnlyByteMemory {}

impl ReadOnlyByteMemory {
    pub(crate) fn new(inner: ByteMemory) -> Self {
        inner.region().holder().freeze();
        Self { inner }
    }

    /// Returns an empty read-only memory. Does not allocate.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(ByteMemory::empty())
    }

    fn region(&self) -> &Region {
        self.inner.region()
    }

    /// The number of addressable bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the memory has no addressable bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The bytes of the memory as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: Our storage was frozen when we were created, so it is not writable.
        unsafe { self.region().as_slice_unchecked() }
    }

    /// Returns the byte at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<u8> {
        self.inner.get(index)
    }

    /// Returns a copy of `count` bytes starting at `pos`.
    ///
    /// A `count` of zero always succeeds with an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the range is not within the memory.
    pub fn read_bytes(&self, pos: usize, count: usize) -> Result<Vec<u8>> {
        self.inner.read_bytes(pos, count)
    }

    /// Decodes a little-endian `i32` starting at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if fewer than 4 bytes are available at `pos`.
    pub fn read_i32(&self, pos: usize) -> Result<i32> {
        self.inner.read_i32(pos)
    }

    /// Decodes a little-endian `u16` starting at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if fewer than 2 bytes are available at `pos`.
    pub fn read_u16(&self, pos: usize) -> Result<u16> {
        self.inner.read_u16(pos)
    }

    /// Decodes `count` bytes starting at `pos` as UTF-8 text.
    ///
    /// Invalid sequences are replaced with U+FFFD. A `count` of zero yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the range is not within the memory.
    pub fn read_utf8_string(&self, pos: usize, count: usize) -> Result<String> {
        self.inner.read_utf8_string(pos, count)
    }

    /// Returns a read-only view over `count` bytes starting at `pos`, sharing storage with `self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if the range is not within the memory.
    pub fn slice(&self, pos: usize, count: usize) -> Result<Self> {
        // The storage is already frozen, so this only marks it frozen again.
        self.inner.slice(pos, count).map(Self::new)
    }

    /// Writes the entire contents of the memory into `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`][crate::Error::Io] if the writer fails.
    pub fn copy_to(&self, writer: &mut (impl Write + ?Sized)) -> Result<()> {
        self.inner.copy_to(writer)
    }

    /// Copies `count` bytes starting at `src_offset` into `dest`, starting at `dest_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`][crate::Error::OutOfRange] if either the source or the
    /// destination range is out of bounds. Nothing is copied in that case.
    pub fn copy(&self, src_offset: usize, dest: &mut [u8], dest_offset: usize, count: usize) -> Result<()> {
        self.inner.copy(src_offset, dest, dest_offset, count)
    }

    /// Returns a copy of the entire contents of the memory.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Returns an adapter that reads and seeks within the memory via `std::io` traits.
    #[must_use]
    pub fn as_stream(&self) -> ReadOnlyByteMemoryStream {
        ReadOnlyByteMemoryStream::new(self.clone())
    }

    /// Keeps the storage alive for as long as the returned guard exists, even if every byte
    /// memory referencing it is dropped.
    pub fn extend_lifetime(&self) -> MemoryGuard {
        self.inner.extend_lifetime()
    }
}

impl Default for ReadOnlyByteMemory {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<ByteMemory> for ReadOnlyByteMemory {
    /// Freezes the storage of `value` and wraps it.
    fn from(value: ByteMemory) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for ReadOnlyByteMemory {
    /// Converts a [`Vec<u8>`] into a `ReadOnlyByteMemory` without copying.
    fn from(value: Vec<u8>) -> Self {
        Self::new(ByteMemory::from_vec(value))
    }
}

impl AsRef<[u8]> for ReadOnlyByteMemory {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(ReadOnlyByteMemory: Send, Sync, Clone);
    }

    #[test]
    fn forwards_reads() {
        let memory = ReadOnlyByteMemory::from(vec![0x01, 0x00, 0x00, 0x80, b'h', b'i']);

        assert_eq!(memory.len(), 6);
        assert_eq!(memory.get(4).unwrap(), b'h');
        assert_eq!(memory.read_i32(0).unwrap(), i32::MIN + 1);
        assert_eq!(memory.read_u16(0).unwrap(), 1);
        assert_eq!(memory.read_utf8_string(4, 2).unwrap(), "hi");
        assert_eq!(memory.read_bytes(1, 2).unwrap(), [0, 0]);
        assert_eq!(memory.as_slice(), memory.to_vec());
        assert!(matches!(memory.get(6), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn slice_is_read_only_and_zero_copy() {
        let memory = ReadOnlyByteMemory::from((0..10).collect::<Vec<u8>>());
        let slice = memory.slice(3, 4).unwrap();

        assert_eq!(slice.as_slice(), [3, 4, 5, 6]);
        assert_eq!(slice.as_slice().as_ptr(), memory.as_slice()[3..].as_ptr());
        assert!(slice.slice(0, 0).unwrap().is_empty());
    }

    #[test]
    fn concurrent_readers() {
        let memory = ReadOnlyByteMemory::from((0..=255).collect::<Vec<u8>>());

        thread::scope(|scope| {
            for chunk in 0..4 {
                let memory = memory.clone();
                scope.spawn(move || {
                    let slice = memory.slice(chunk * 64, 64).unwrap();
                    let expected: Vec<u8> = (chunk * 64..(chunk + 1) * 64).map(|x| x as u8).collect();
                    assert_eq!(slice.to_vec(), expected);
                });
            }
        });
    }

    #[test]
    fn copy_into_destination() {
        let memory = ReadOnlyByteMemory::from(b"abcdef".to_vec());
        let mut dest = [0_u8; 3];

        memory.copy(3, &mut dest, 0, 3).unwrap();
        assert_eq!(&dest, b"def");

        let mut out = Vec::new();
        memory.copy_to(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
    }
}
