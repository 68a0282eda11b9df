// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Any error that may arise from reading, writing or constructing byte memory.
///
/// None of these errors are retried internally. An operation that returns an error
/// leaves the memory, cursor or buffer it was called on unchanged.
///
/// # Thread safety
///
/// This type is thread-safe.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An index, offset or length argument would access bytes outside the
    /// addressable range of the memory (or of a destination slice).
    #[error("range [{offset}, {offset} + {count}) is out of bounds for a region of {len} bytes")]
    OutOfRange {
        /// Start of the requested range.
        offset: usize,
        /// Number of bytes requested.
        count: usize,
        /// Number of bytes actually addressable.
        len: usize,
    },

    /// A [`ByteStream`][crate::ByteStream] read would advance the cursor past the end of its window.
    #[error("cannot read {count} bytes at position {position}, the stream ends at {max}")]
    EndOfStream {
        /// Cursor position at the time of the read.
        position: usize,
        /// Number of bytes requested.
        count: usize,
        /// End of the stream window.
        max: usize,
    },

    /// The operation is not permitted on this memory, e.g. writing to a read-only mapping
    /// or to storage that has been frozen by [`ByteMemory::as_read_only()`][1].
    ///
    /// [1]: crate::ByteMemory::as_read_only
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// We are forwarding an error received from the standard library's I/O or file system APIs.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` for byte memory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) const fn out_of_range(offset: usize, count: usize, len: usize) -> Self {
        Self::OutOfRange { offset, count, len }
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

/// Represents a byte memory error as a standard I/O error.
///
/// This is used by the stream adapters, which must report failures through `std::io` traits.
impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(error) => error,
            Error::OutOfRange { .. } => Self::new(std::io::ErrorKind::InvalidInput, value),
            Error::EndOfStream { .. } => Self::new(std::io::ErrorKind::UnexpectedEof, value),
            Error::InvalidOperation(_) => Self::new(std::io::ErrorKind::PermissionDenied, value),
        }
    }
}
