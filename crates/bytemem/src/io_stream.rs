// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::{self, BufRead, ErrorKind, Read, Seek, SeekFrom, Write};

use crate::region::{Backing, Region};
use crate::{Error, ReadOnlyByteMemory};

/// Adapter that implements [`Read`], [`Write`] and [`Seek`] over a [`ByteMemory`][1].
///
/// Create an instance via [`ByteMemory::as_stream()`][2] or [`ByteMemory::as_read_only_stream()`][3].
///
/// The stream behaves like a [`std::io::Cursor`] over a fixed-size slice: reads and writes
/// start at the current position, the position may be moved past the end of the memory,
/// reads past the end return zero bytes and writes past the end write zero bytes. The memory
/// never grows.
///
/// The stream keeps the storage alive until it is dropped.
///
/// [1]: crate::ByteMemory
/// [2]: crate::ByteMemory::as_stream
/// [3]: crate::ByteMemory::as_read_only_stream
#[derive(Debug)]
pub struct ByteMemoryStream {
    region: Region,
    position: usize,
    writable: bool,
}

impl ByteMemoryStream {
    pub(crate) const fn new(region: Region, writable: bool) -> Self {
        Self {
            region,
            position: 0,
            writable,
        }
    }

    /// The current position of the stream, in bytes from the start of the memory.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// The length of the underlying memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Whether the underlying memory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    fn remaining(&self) -> usize {
        self.region.len().saturating_sub(self.position)
    }
}

impl Read for ByteMemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = buf.len().min(self.remaining());
        if to_read == 0 {
            return Ok(0);
        }

        self.region.read_into(self.position, &mut buf[..to_read])?;
        self.position += to_read;
        Ok(to_read)
    }
}

impl Write for ByteMemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(Error::invalid_operation("the stream is read-only").into());
        }

        let to_write = buf.len().min(self.remaining());
        if to_write == 0 {
            return Ok(0);
        }

        self.region.write_from(self.position, &buf[..to_write])?;
        self.position += to_write;
        Ok(to_write)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for ByteMemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = seek_target(self.position, self.region.len(), pos)?;
        Ok(self.position as u64)
    }
}

/// Adapter that implements [`Read`], [`BufRead`] and [`Seek`] over a [`ReadOnlyByteMemory`].
///
/// Create an instance via [`ReadOnlyByteMemory::as_stream()`].
///
/// Because the bytes are immutable and contiguous, this adapter implements [`BufRead`] directly
/// without needing an intermediate buffer. Prefer this over wrapping in [`std::io::BufReader`].
#[derive(Debug)]
pub struct ReadOnlyByteMemoryStream {
    memory: ReadOnlyByteMemory,
    position: usize,
}

impl ReadOnlyByteMemoryStream {
    pub(crate) const fn new(memory: ReadOnlyByteMemory) -> Self {
        Self { memory, position: 0 }
    }

    /// The current position of the stream, in bytes from the start of the memory.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Consumes the stream, returning the memory it reads from.
    #[must_use]
    pub fn into_inner(self) -> ReadOnlyByteMemory {
        self.memory
    }

    fn unread(&self) -> &[u8] {
        let bytes = self.memory.as_slice();
        &bytes[self.position.min(bytes.len())..]
    }
}

impl Read for ReadOnlyByteMemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let unread = self.unread();
        let to_read = buf.len().min(unread.len());

        buf[..to_read].copy_from_slice(&unread[..to_read]);
        self.position += to_read;
        Ok(to_read)
    }
}

impl BufRead for ReadOnlyByteMemoryStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.unread())
    }

    fn consume(&mut self, amount: usize) {
        self.position = self.position.saturating_add(amount);
    }
}

impl Seek for ReadOnlyByteMemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = seek_target(self.position, self.memory.len(), pos)?;
        Ok(self.position as u64)
    }
}

fn seek_target(current: usize, len: usize, pos: SeekFrom) -> io::Result<usize> {
    let target = match pos {
        SeekFrom::Start(offset) => usize::try_from(offset).ok(),
        SeekFrom::End(offset) => isize::try_from(offset).ok().and_then(|offset| len.checked_add_signed(offset)),
        SeekFrom::Current(offset) => isize::try_from(offset)
            .ok()
            .and_then(|offset| current.checked_add_signed(offset)),
    };

    target.ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "invalid seek to a negative or overflowing position"))
}
