// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Error, ReadOnlyByteMemory, Result};

/// A sequential reader over a window `[start, start + len)` of a [`ReadOnlyByteMemory`].
///
/// The stream advances a cursor as data is consumed. Every read is checked against the end of
/// the window and fails with [`Error::EndOfStream`] rather than reading past it, in which case
/// the cursor does not move.
///
/// The stream shares storage with the memory it was created from, so byte sequences returned by
/// [`read_bytes()`][Self::read_bytes] are zero-copy views. Independent streams over the same
/// memory may be used from different threads at the same time.
///
/// # Example
///
/// ```
/// use bytemem::{ByteStream, ReadOnlyByteMemory};
///
/// let memory = ReadOnlyByteMemory::from(b"\x05hello world".to_vec());
/// let mut stream = ByteStream::from_bytes(&memory, 0, 6)?;
///
/// let len = stream.read_byte()?;
/// assert_eq!(stream.read_utf8_string(usize::from(len))?, "hello");
/// assert!(stream.is_eof());
/// # Ok::<(), bytemem::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct ByteStream {
    bytes: ReadOnlyByteMemory,

    // Invariant: start <= pos <= max <= bytes.len()
    #[cfg(debug_assertions)]
    start: usize,
    pos: usize,
    max: usize,
}

impl ByteStream {
    /// Creates a stream over `len` bytes of `memory`, starting at `start`.
    ///
    /// The cursor is initially positioned at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if the window is not within `memory`.
    pub fn from_bytes(memory: &ReadOnlyByteMemory, start: usize, len: usize) -> Result<Self> {
        let max = start
            .checked_add(len)
            .filter(|&max| max <= memory.len())
            .ok_or_else(|| Error::out_of_range(start, len, memory.len()))?;

        Ok(Self {
            bytes: memory.clone(),
            #[cfg(debug_assertions)]
            start,
            pos: start,
            max,
        })
    }

    /// The current position of the cursor, as an offset into the memory the stream was created from.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// The number of bytes left before the end of the window.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.max - self.pos
    }

    /// Whether the cursor has reached the end of the window.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos == self.max
    }

    /// Reads one byte and advances the cursor past it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] if the cursor is at the end of the window.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.check_available(1)?;

        let value = self.bytes.get(self.pos)?;
        self.pos += 1;
        Ok(value)
    }

    /// Decodes the next `count` bytes as UTF-8 text and advances the cursor past them.
    ///
    /// Invalid sequences are replaced with U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] if fewer than `count` bytes remain in the window.
    pub fn read_utf8_string(&mut self, count: usize) -> Result<String> {
        self.check_available(count)?;

        let value = self.bytes.read_utf8_string(self.pos, count)?;
        self.pos += count;
        Ok(value)
    }

    /// Returns a view over the next `count` bytes and advances the cursor past them.
    ///
    /// The view shares storage with the stream; no bytes are copied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfStream`] if fewer than `count` bytes remain in the window.
    pub fn read_bytes(&mut self, count: usize) -> Result<ReadOnlyByteMemory> {
        self.check_available(count)?;

        let value = self.bytes.slice(self.pos, count)?;
        self.pos += count;
        Ok(value)
    }

    /// Moves the cursor to `pos`, an offset into the memory the stream was created from.
    ///
    /// Only available in debug builds, for diagnosing decoders.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `pos` is outside the window.
    #[cfg(debug_assertions)]
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos < self.start || pos > self.max {
            return Err(Error::out_of_range(pos, 0, self.max));
        }

        self.pos = pos;
        Ok(())
    }

    fn check_available(&self, count: usize) -> Result<()> {
        if count <= self.remaining() {
            Ok(())
        } else {
            Err(Error::EndOfStream {
                position: self.pos,
                count,
                max: self.max,
            })
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    fn memory(bytes: &[u8]) -> ReadOnlyByteMemory {
        ReadOnlyByteMemory::from(bytes.to_vec())
    }

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(ByteStream: Send, Sync);
    }

    #[test]
    fn window_validated_on_creation() {
        let memory = memory(&[0; 10]);

        ByteStream::from_bytes(&memory, 0, 10).unwrap();
        ByteStream::from_bytes(&memory, 10, 0).unwrap();

        assert!(matches!(
            ByteStream::from_bytes(&memory, 5, 6),
            Err(Error::OutOfRange { offset: 5, count: 6, len: 10 })
        ));
        assert!(matches!(
            ByteStream::from_bytes(&memory, usize::MAX, 2),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn read_byte_stops_at_window_end() {
        let memory = memory(&[1, 2, 3, 4]);
        let mut stream = ByteStream::from_bytes(&memory, 1, 2).unwrap();

        assert_eq!(stream.position(), 1);
        assert_eq!(stream.read_byte().unwrap(), 2);
        assert_eq!(stream.read_byte().unwrap(), 3);
        assert!(stream.is_eof());

        // Byte 4 exists in the memory but is outside the window.
        assert!(matches!(
            stream.read_byte(),
            Err(Error::EndOfStream { position: 3, count: 1, max: 3 })
        ));
        assert_eq!(stream.position(), 3);
    }

    #[test]
    fn read_bytes_is_zero_copy() {
        let memory = memory(b"abcdef");
        let mut stream = ByteStream::from_bytes(&memory, 0, 6).unwrap();

        let head = stream.read_bytes(2).unwrap();
        assert_eq!(head.as_slice(), b"ab");
        assert_eq!(head.as_slice().as_ptr(), memory.as_slice().as_ptr());
        assert_eq!(stream.remaining(), 4);

        assert!(stream.read_bytes(0).unwrap().is_empty());
        assert_eq!(stream.position(), 2);
    }

    #[test]
    fn failed_reads_do_not_move_cursor() {
        let memory = memory(b"abcdef");
        let mut stream = ByteStream::from_bytes(&memory, 2, 3).unwrap();

        assert!(matches!(
            stream.read_bytes(4),
            Err(Error::EndOfStream { position: 2, count: 4, max: 5 })
        ));
        assert!(matches!(stream.read_utf8_string(4), Err(Error::EndOfStream { .. })));
        assert_eq!(stream.position(), 2);

        assert_eq!(stream.read_utf8_string(3).unwrap(), "cde");
        assert!(stream.is_eof());
    }

    #[test]
    fn utf8_strings() {
        let memory = memory("naïve".as_bytes());
        let mut stream = ByteStream::from_bytes(&memory, 0, memory.len()).unwrap();

        assert_eq!(stream.read_utf8_string(0).unwrap(), "");
        assert_eq!(stream.read_utf8_string(memory.len()).unwrap(), "naïve");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn seek_within_window() {
        let memory = memory(&[9, 8, 7]);
        let mut stream = ByteStream::from_bytes(&memory, 0, 3).unwrap();

        stream.seek(2).unwrap();
        assert_eq!(stream.read_byte().unwrap(), 7);

        stream.seek(0).unwrap();
        assert_eq!(stream.read_byte().unwrap(), 9);

        assert!(matches!(stream.seek(4), Err(Error::OutOfRange { .. })));
        assert_eq!(stream.position(), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn seek_before_window_fails() {
        let memory = memory(&[9, 8, 7, 6]);
        let mut stream = ByteStream::from_bytes(&memory, 1, 2).unwrap();

        assert!(matches!(stream.seek(0), Err(Error::OutOfRange { offset: 0, .. })));
        assert_eq!(stream.position(), 1);

        stream.seek(3).unwrap();
        assert!(stream.is_eof());

        stream.seek(1).unwrap();
        assert_eq!(stream.read_byte().unwrap(), 8);
        assert_eq!(stream.remaining(), 1);
    }

    #[test]
    fn independent_streams_on_threads() {
        let memory = memory(&(0..=199).collect::<Vec<u8>>());

        thread::scope(|scope| {
            for start in [0, 100] {
                let mut stream = ByteStream::from_bytes(&memory, start, 100).unwrap();
                scope.spawn(move || {
                    let mut sum = 0_usize;
                    while !stream.is_eof() {
                        sum += usize::from(stream.read_byte().unwrap());
                    }
                    assert_eq!(sum, (start..start + 100).sum::<usize>());
                });
            }
        });
    }
}
