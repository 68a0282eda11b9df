// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use memmap2::{Mmap, MmapMut};
use tracing::{Level, event};

/// Keeps the storage behind a byte memory region alive.
///
/// Every region, slice, stream and read-only view over some storage holds an `Arc<Holder>`
/// to it. The storage is released when the last of these is dropped, which means it is
/// released exactly once and never while anything can still address it.
///
/// The holder also tracks whether the storage may be written to. Storage is writable only if
/// it was created writable and has not been frozen. Freezing is one-way and happens when a
/// read-only view is derived from a region, after which the bytes are immutable for the rest
/// of the storage lifetime.
pub(crate) struct Holder {
    keep_alive: KeepAlive,
    writable: bool,
    frozen: AtomicBool,
}

/// The object whose lifetime defines the validity of the storage.
///
/// Nothing reads the storage through these values - all access goes through raw pointers
/// captured when the region was created. They exist to be dropped at the right time.
pub(crate) enum KeepAlive {
    /// No storage; used for the canonical empty region.
    Empty,

    /// A heap array. We hold the `Vec` itself rather than a `Box<[u8]>` because pointers into
    /// a `Vec` remain valid when the `Vec` is moved.
    Array(Vec<u8>),

    /// A read-only mapping of a file.
    Mapped(Mmap),

    /// A writable mapping, either of a file or an anonymous region.
    MappedMut(MmapMut),

    /// Storage owned by the caller of [`ByteMemory::from_unsafe_pointer()`][1].
    ///
    /// [1]: crate::ByteMemory::from_unsafe_pointer
    External(Box<dyn Any + Send + Sync>),
}

impl KeepAlive {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Array(_) => "array",
            Self::Mapped(_) => "mapped",
            Self::MappedMut(_) => "mapped_mut",
            Self::External(_) => "external",
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Empty | Self::External(_) => 0,
            Self::Array(vec) => vec.len(),
            Self::Mapped(map) => map.len(),
            Self::MappedMut(map) => map.len(),
        }
    }
}

impl Holder {
    pub(crate) fn new(keep_alive: KeepAlive, writable: bool) -> Arc<Self> {
        Arc::new(Self {
            keep_alive,
            writable,
            frozen: AtomicBool::new(false),
        })
    }

    /// Whether writes to the storage are currently permitted.
    pub(crate) fn is_writable(&self) -> bool {
        self.writable && !self.frozen.load(Ordering::Acquire)
    }

    /// Permanently forbids writes to the storage.
    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub(crate) const fn kind(&self) -> &'static str {
        self.keep_alive.kind()
    }
}

impl Drop for Holder {
    #[cfg_attr(test, mutants::skip)] // Logging only.
    fn drop(&mut self) {
        event!(
            Level::TRACE,
            message = "releasing byte memory storage",
            kind = self.kind(),
            len = self.keep_alive.len()
        );
    }
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("kind", &self.kind())
            .field("writable", &self.writable)
            .field("frozen", &self.frozen.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Prevents the storage behind some byte memory from being released while the guard is alive.
///
/// Call [`ByteMemory::extend_lifetime()`][1] or [`ReadOnlyByteMemory::extend_lifetime()`][2]
/// to obtain an instance.
///
/// This is useful when the bytes are handed to logic that is not tracked by the borrow checker
/// (e.g. a raw pointer passed to foreign code), where no Rust object would otherwise be
/// keeping a memory mapping open.
///
/// [1]: crate::ByteMemory::extend_lifetime
/// [2]: crate::ReadOnlyByteMemory::extend_lifetime
#[derive(Debug)]
#[must_use]
pub struct MemoryGuard {
    _holder: Arc<Holder>,
}

impl MemoryGuard {
    pub(crate) const fn new(holder: Arc<Holder>) -> Self {
        Self { _holder: holder }
    }
}
