// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Uniform access to fixed-length byte regions, regardless of where the bytes live.
//!
//! Binary formats are often read from large files where copying the whole file into the heap
//! before decoding would be wasteful, while other times the same format arrives as a plain byte
//! array. This crate hides the difference behind one type, [`ByteMemory`], which may be backed by:
//!
//! * a heap array ([`ByteMemory::from_array()`], [`ByteMemory::from_vec()`]),
//! * a memory-mapped file ([`ByteMemory::from_file()`], [`FileOptions`]),
//! * a private copy of a file or of existing bytes in an anonymous mapping
//!   ([`FileOptions::shadow_copy()`], [`ByteMemory::create_memory_mapped_file()`]),
//! * memory owned by foreign code ([`ByteMemory::from_unsafe_pointer()`]).
//!
//! Whatever the storage, bytes are addressed by index in `[0, len)` and every access is bounds
//! checked. Slicing is zero-copy and keeps the storage alive; storage is released exactly once,
//! when the last value referencing it is dropped.
//!
//! # Reading
//!
//! Random access decoding is done directly on the memory via methods such as
//! [`read_i32()`][ByteMemory::read_i32] and [`read_utf8_string()`][ByteMemory::read_utf8_string].
//! All multi-byte integers are little-endian.
//!
//! Sequential decoding is done via [`ByteStream`], a cursor over a window of a
//! [`ReadOnlyByteMemory`]. Many streams may read the same memory from different threads.
//!
//! ```
//! use bytemem::{ByteMemory, ByteStream};
//!
//! let memory = ByteMemory::from_vec(b"\x02\x00\x00\x00hi".to_vec()).as_read_only();
//!
//! let len = memory.read_i32(0)?;
//! let mut stream = ByteStream::from_bytes(&memory, 4, 2)?;
//! assert_eq!(stream.read_utf8_string(len as usize)?, "hi");
//! # Ok::<(), bytemem::Error>(())
//! ```
//!
//! # Mutation and thread safety
//!
//! [`ByteMemory`] permits writes through [`set()`][ByteMemory::set] and its stream adapter.
//! Because every clone and slice shares storage, `ByteMemory` is neither `Send` nor `Sync`.
//! [`ByteMemory::as_read_only()`] freezes the storage permanently and returns a
//! [`ReadOnlyByteMemory`], which is `Send + Sync` and exposes the bytes as `&[u8]`.
//!
//! # Writing
//!
//! New binary content is built with [`ByteBuffer`], a growable append-only buffer that can patch
//! fixed-width fields after the fact:
//!
//! ```
//! use bytemem::ByteBuffer;
//!
//! let mut buffer = ByteBuffer::new();
//! let len_pos = buffer.len();
//! buffer.emit_i32(0);
//! buffer.emit_bytes(b"payload");
//! buffer.fixup_i32(len_pos, 7);
//!
//! assert_eq!(buffer.close(), b"\x07\x00\x00\x00payload");
//! ```
//!
//! # Standard I/O
//!
//! [`ByteMemory::as_stream()`] and [`ReadOnlyByteMemory::as_stream()`] adapt memory to the
//! `std::io` traits, and [`ByteBuffer`] implements [`std::io::Write`].
//!
//! # Configuration
//!
//! Memory mapping is used on platforms that support it unless the [`DISABLE_MAPPING_ENV_VAR`]
//! environment variable is set, in which case files are read into heap memory instead.

mod access;
mod array;
mod buffer;
mod config;
mod error;
mod file;
mod holder;
mod io_stream;
mod memory;
mod raw;
mod read_only;
mod region;
mod stream;

pub use access::FileAccess;
pub use buffer::ByteBuffer;
pub use config::{DISABLE_MAPPING_ENV_VAR, memory_mapping_supported};
pub use error::{Error, Result};
pub use file::FileOptions;
pub use holder::MemoryGuard;
pub use io_stream::{ByteMemoryStream, ReadOnlyByteMemoryStream};
pub use memory::ByteMemory;
pub use read_only::ReadOnlyByteMemory;
pub use stream::ByteStream;
