// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;

use nm::{Event, Magnitude};

use crate::{ByteMemory, ReadOnlyByteMemory};

/// A growable, append-only buffer for emitting new binary content.
///
/// Values are appended at the end of the written content. Fixed-width fields may be reserved
/// with a placeholder and patched later via [`fixup_i32()`][Self::fixup_i32], which supports
/// emitting a header whose contents are only known after the body has been emitted.
///
/// Capacity grows geometrically: when more space is needed, the buffer grows to at least
/// double its current capacity. Call [`close()`][Self::close] to obtain exactly the written
/// bytes without the slack.
///
/// All multi-byte integers are emitted in little-endian byte order.
///
/// # Example
///
/// ```
/// use bytemem::ByteBuffer;
///
/// let mut buffer = ByteBuffer::new();
///
/// buffer.emit_bytes(&[0x01, 0x02]);
/// let count_pos = buffer.len();
/// buffer.emit_i32(0); // placeholder
/// buffer.emit_byte(0x03);
///
/// buffer.fixup_i32(count_pos, 0xAABB_CCDD_u32.cast_signed());
///
/// assert_eq!(buffer.close(), [0x01, 0x02, 0xDD, 0xCC, 0xBB, 0xAA, 0x03]);
/// ```
#[derive(Debug, Default)]
pub struct ByteBuffer {
    // The written content is `array[..array.len()]`; spare capacity is growth slack.
    array: Vec<u8>,
}

impl ByteBuffer {
    /// Creates an empty buffer. Does not allocate until content is emitted.
    #[must_use]
    pub const fn new() -> Self {
        Self { array: Vec::new() }
    }

    /// Creates an empty buffer with room for at least `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            array: Vec::with_capacity(capacity),
        }
    }

    /// The number of bytes emitted so far. This is also the position the next value is emitted at.
    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Whether nothing has been emitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// The number of bytes the buffer can hold without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.array.capacity()
    }

    /// Ensures the buffer can hold at least `new_size` bytes in total.
    ///
    /// If the current capacity is insufficient, the buffer grows to the larger of `new_size`
    /// and double the current capacity. Written content is preserved.
    pub fn ensure(&mut self, new_size: usize) {
        let capacity = self.array.capacity();
        if new_size <= capacity {
            return;
        }

        let target = new_size.max(capacity.saturating_mul(2));
        self.array.reserve_exact(target - self.array.len());

        BUFFER_GROWN_CAPACITY.with(|e| e.observe(target));
    }

    /// Appends a byte.
    pub fn emit_byte(&mut self, value: u8) {
        self.emit_bytes(&[value]);
    }

    /// Appends a sequence of bytes.
    pub fn emit_bytes(&mut self, value: &[u8]) {
        self.ensure(self.array.len().saturating_add(value.len()));
        self.array.extend_from_slice(value);
    }

    /// Appends the entire contents of `memory`.
    pub fn emit_byte_memory(&mut self, memory: &ByteMemory) {
        self.ensure(self.array.len().saturating_add(memory.len()));
        memory.region().append_to(&mut self.array);
    }

    /// Appends the entire contents of `memory`.
    pub fn emit_read_only_memory(&mut self, memory: &ReadOnlyByteMemory) {
        self.emit_bytes(memory.as_slice());
    }

    /// Appends a 32-bit signed integer (4 bytes).
    pub fn emit_i32(&mut self, value: i32) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Appends a 16-bit unsigned integer (2 bytes).
    pub fn emit_u16(&mut self, value: u16) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Appends the low 16 bits of `value` (2 bytes). The high bits are discarded.
    pub fn emit_i32_as_u16(&mut self, value: i32) {
        let [low, high, ..] = value.to_le_bytes();
        self.emit_bytes(&[low, high]);
    }

    /// Appends a 64-bit signed integer (8 bytes).
    ///
    /// The layout is identical to emitting the low 32 bits followed by the high 32 bits,
    /// each as a little-endian 32-bit integer.
    pub fn emit_i64(&mut self, value: i64) {
        self.emit_bytes(&value.to_le_bytes());
    }

    /// Appends a boolean as a single byte, `1` for `true` and `0` for `false`.
    pub fn emit_bool(&mut self, value: bool) {
        self.emit_byte(u8::from(value));
    }

    /// Appends the low 8 bits of each integer in `values` (one byte each).
    pub fn emit_ints_as_bytes(&mut self, values: &[i32]) {
        self.ensure(self.array.len().saturating_add(values.len()));
        self.array.extend(values.iter().map(|value| {
            let [low, ..] = value.to_le_bytes();
            low
        }));
    }

    /// Overwrites the 4 bytes previously emitted at `pos` with `value`.
    ///
    /// The write position is not changed. This is used to patch a placeholder emitted via
    /// [`emit_i32()`][Self::emit_i32] once the real value is known.
    ///
    /// # Panics
    ///
    /// Panics if the 4 bytes at `pos` have not been emitted yet.
    pub fn fixup_i32(&mut self, pos: usize, value: i32) {
        assert!(
            pos.checked_add(4).is_some_and(|end| end <= self.array.len()),
            "fixup at position {pos} is beyond the {} bytes emitted so far",
            self.array.len()
        );

        self.array[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Consumes the buffer and returns exactly the emitted bytes.
    #[must_use]
    pub fn close(mut self) -> Vec<u8> {
        self.array.shrink_to_fit();
        self.array
    }
}

impl io::Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.emit_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const CAPACITY_BUCKETS: &[Magnitude] = &[
    0, 256, 1024, 4096, 16_384, 65_536, 262_144, 1_048_576, 4_194_304, 16_777_216,
];

thread_local! {
    static BUFFER_GROWN_CAPACITY: Event = Event::builder()
        .name("bytemem_buffer_grown_capacity")
        .histogram(CAPACITY_BUCKETS)
        .build();
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(ByteBuffer: Send, Sync);
    }

    #[test]
    fn fixup_example() {
        let mut buffer = ByteBuffer::new();

        buffer.emit_bytes(&[0x01, 0x02]);
        buffer.emit_i32(0);
        buffer.emit_byte(0x03);
        buffer.fixup_i32(2, 0xAABB_CCDD_u32.cast_signed());

        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.close(), [0x01, 0x02, 0xDD, 0xCC, 0xBB, 0xAA, 0x03]);
    }

    #[test]
    fn fixup_long_before_close() {
        let mut buffer = ByteBuffer::with_capacity(1);
        buffer.emit_i32(-1);

        for i in 0..10_000 {
            buffer.emit_i32(i);
        }

        buffer.fixup_i32(0, 12345);
        let bytes = ByteMemory::from_vec(buffer.close());

        assert_eq!(bytes.read_i32(0).unwrap(), 12345);
        assert_eq!(bytes.read_i32(4 * 10_000).unwrap(), 9_999);
    }

    #[test]
    #[should_panic]
    fn fixup_beyond_written_content_panics() {
        let mut buffer = ByteBuffer::with_capacity(64);
        buffer.emit_bytes(&[0; 3]);
        buffer.fixup_i32(0, 1);
    }

    #[test]
    fn i32_round_trip() {
        let values = [i32::MIN, -1, 0, 1, i32::MAX];

        let mut buffer = ByteBuffer::new();
        buffer.emit_byte(0xEE);
        for value in values {
            buffer.emit_i32(value);
        }

        let bytes = ByteMemory::from_vec(buffer.close());
        for (i, value) in values.into_iter().enumerate() {
            assert_eq!(bytes.read_i32(1 + i * 4).unwrap(), value);
        }
    }

    #[test]
    fn u16_round_trip() {
        let values = [0, 1, 0x1234, u16::MAX];

        let mut buffer = ByteBuffer::new();
        for value in values {
            buffer.emit_u16(value);
        }

        let bytes = ByteMemory::from_vec(buffer.close());
        for (i, value) in values.into_iter().enumerate() {
            assert_eq!(bytes.read_u16(i * 2).unwrap(), value);
        }
    }

    #[test]
    fn truncating_emitters() {
        let mut buffer = ByteBuffer::new();

        buffer.emit_i32_as_u16(0x0012_3456);
        buffer.emit_i32_as_u16(-1);
        buffer.emit_ints_as_bytes(&[0x1FF, -2, 7]);

        assert_eq!(buffer.close(), [0x56, 0x34, 0xFF, 0xFF, 0xFF, 0xFE, 0x07]);
    }

    #[test]
    fn i64_as_two_halves() {
        let value = 0x0102_0304_0506_0708_i64;

        let mut buffer = ByteBuffer::new();
        buffer.emit_i64(value);
        let bytes = ByteMemory::from_vec(buffer.close());

        assert_eq!(bytes.read_i32(0).unwrap(), 0x0506_0708);
        assert_eq!(bytes.read_i32(4).unwrap(), 0x0102_0304);

        let mut buffer = ByteBuffer::new();
        buffer.emit_i64(-2);
        assert_eq!(buffer.close(), [0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn booleans() {
        let mut buffer = ByteBuffer::new();
        buffer.emit_bool(true);
        buffer.emit_bool(false);

        assert_eq!(buffer.close(), [1, 0]);
    }

    #[test]
    fn one_at_a_time_equals_bulk() {
        for n in [0, 1, 2, 15, 16, 17, 1000] {
            let bytes: Vec<u8> = (0..n).map(|i| (i % 256) as u8).collect();

            let mut single = ByteBuffer::new();
            for &b in &bytes {
                single.emit_byte(b);
            }

            let mut bulk = ByteBuffer::new();
            bulk.emit_bytes(&bytes);

            assert_eq!(single.close(), bulk.close());
        }
    }

    #[test]
    fn growth_is_geometric() {
        let mut buffer = ByteBuffer::with_capacity(16);
        buffer.emit_bytes(&[0; 16]);

        buffer.ensure(17);
        assert!(buffer.capacity() >= 32);

        buffer.ensure(1000);
        assert!(buffer.capacity() >= 1000);

        // Already large enough, so no change.
        let capacity = buffer.capacity();
        buffer.ensure(10);
        assert_eq!(buffer.capacity(), capacity);
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn close_trims_slack() {
        let mut buffer = ByteBuffer::with_capacity(1024);
        buffer.emit_bytes(b"abc");

        let bytes = buffer.close();
        assert_eq!(bytes, b"abc");
        assert!(bytes.capacity() < 1024);
    }

    #[test]
    fn emit_memory_regions() {
        let memory = ByteMemory::from_vec(b"hello ".to_vec());
        let read_only = ReadOnlyByteMemory::from(b"world".to_vec());

        let mut buffer = ByteBuffer::new();
        buffer.emit_byte_memory(&memory);
        buffer.emit_byte_memory(&ByteMemory::empty());
        buffer.emit_read_only_memory(&read_only);

        assert_eq!(buffer.close(), b"hello world");
        assert!(memory.is_writable());
    }

    #[test]
    fn copy_to_targets_buffer() {
        let memory = ByteMemory::from_vec(b"copied".to_vec());

        let mut buffer = ByteBuffer::new();
        memory.copy_to(&mut buffer).unwrap();
        buffer.write_all(b"!").unwrap();
        buffer.flush().unwrap();

        assert_eq!(buffer.close(), b"copied!");
    }

    #[test]
    fn new_buffer_is_empty() {
        let buffer = ByteBuffer::default();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.close().is_empty());
    }
}
