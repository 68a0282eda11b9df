// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;
use std::sync::{Arc, LazyLock};

use crate::holder::{Holder, KeepAlive};
use crate::region::{Backing, Region};
use crate::{Error, Result};

/// Shared by every empty region, so empty slices never keep large arrays alive.
static EMPTY: LazyLock<Arc<Holder>> = LazyLock::new(|| Holder::new(KeepAlive::Empty, false));

/// A window `[offset, offset + len)` into a heap-owned byte array.
///
/// The array is shared between all windows sliced from the same original, so slicing is
/// zero-copy. The array is released when the last window over it is dropped.
#[derive(Clone, Debug)]
pub(crate) struct ArrayByteMemory {
    array: Arc<Holder>,

    // Address of element 0 of the array, captured before the array was moved into the holder.
    base: NonNull<u8>,

    // Used only to validate the invariant `offset + len <= array_len` in debug builds.
    array_len: usize,

    offset: usize,
    len: usize,
}

impl ArrayByteMemory {
    /// Creates a window over `bytes`, validating it against the true length of the array.
    pub(crate) fn new(bytes: Vec<u8>, offset: usize, len: usize, writable: bool) -> Result<Self> {
        match offset.checked_add(len) {
            // An empty window must not keep the array alive.
            Some(end) if end <= bytes.len() && len == 0 => Ok(Self::empty()),
            Some(end) if end <= bytes.len() => Ok(Self {
                offset,
                len,
                ..Self::whole(bytes, writable)
            }),
            _ => Err(Error::out_of_range(offset, len, bytes.len())),
        }
    }

    /// Creates a window over the entire array.
    pub(crate) fn whole(mut bytes: Vec<u8>, writable: bool) -> Self {
        let len = bytes.len();
        let base = NonNull::from(bytes.as_mut_slice()).cast::<u8>();

        Self {
            array: Holder::new(KeepAlive::Array(bytes), writable),
            base,
            array_len: len,
            offset: 0,
            len,
        }
    }

    /// The canonical empty window. It references no array.
    pub(crate) fn empty() -> Self {
        Self {
            array: Arc::clone(&EMPTY),
            base: NonNull::dangling(),
            array_len: 0,
            offset: 0,
            len: 0,
        }
    }
}

impl Backing for ArrayByteMemory {
    fn len(&self) -> usize {
        self.len
    }

    fn start(&self) -> NonNull<u8> {
        debug_assert!(self.offset + self.len <= self.array_len);

        // SAFETY: `offset <= array_len` is validated at construction and preserved by slicing,
        // so the result is within the array or one past its end.
        unsafe { self.base.add(self.offset) }
    }

    fn holder(&self) -> &Arc<Holder> {
        &self.array
    }

    fn sub_region(&self, pos: usize, count: usize) -> Region {
        debug_assert!(count > 0 && pos + count <= self.len);

        Region::Array(Self {
            array: Arc::clone(&self.array),
            base: self.base,
            array_len: self.array_len,
            offset: self.offset + pos,
            len: count,
        })
    }
}
