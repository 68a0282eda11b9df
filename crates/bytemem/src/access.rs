// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// The kind of access requested from (or granted by) file-backed byte memory.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum FileAccess {
    /// The bytes may be read but not modified.
    #[default]
    Read,

    /// The bytes may be modified.
    ///
    /// Memory mappings are always readable, so in practice this grants the same
    /// capabilities as [`ReadWrite`][Self::ReadWrite].
    Write,

    /// The bytes may be read and modified.
    ReadWrite,
}

impl FileAccess {
    /// Whether this access mode permits reading.
    #[must_use]
    pub const fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether this access mode permits writing.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    /// Whether an object granted `self` access can satisfy a request for `requested` access.
    #[must_use]
    pub const fn grants(self, requested: Self) -> bool {
        (!requested.can_read() || self.can_read()) && (!requested.can_write() || self.can_write())
    }
}

impl fmt::Display for FileAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read-write",
        })
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities() {
        assert!(FileAccess::Read.can_read());
        assert!(!FileAccess::Read.can_write());
        assert!(!FileAccess::Write.can_read());
        assert!(FileAccess::Write.can_write());
        assert!(FileAccess::ReadWrite.can_read());
        assert!(FileAccess::ReadWrite.can_write());
    }

    #[test]
    fn read_write_grants_everything() {
        for requested in [FileAccess::Read, FileAccess::Write, FileAccess::ReadWrite] {
            assert!(FileAccess::ReadWrite.grants(requested));
        }
    }

    #[test]
    fn read_only_grants_only_read() {
        assert!(FileAccess::Read.grants(FileAccess::Read));
        assert!(!FileAccess::Read.grants(FileAccess::Write));
        assert!(!FileAccess::Read.grants(FileAccess::ReadWrite));
    }

    #[test]
    fn write_only_does_not_grant_read() {
        assert!(FileAccess::Write.grants(FileAccess::Write));
        assert!(!FileAccess::Write.grants(FileAccess::Read));
    }

    #[test]
    fn display() {
        assert_eq!(FileAccess::ReadWrite.to_string(), "read-write");
        assert_eq!(FileAccess::default().to_string(), "read");
    }
}
