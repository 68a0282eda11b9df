// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;

use memmap2::MmapOptions;
use nm::{Event, Magnitude};
use tracing::{Level, event};

use crate::array::ArrayByteMemory;
use crate::raw::RawByteMemory;
use crate::region::Region;
use crate::{ByteMemory, Error, FileAccess, ReadOnlyByteMemory, Result, memory_mapping_supported};

/// Options which can be used to configure how a file is loaded into byte memory.
///
/// This builder exposes the ability to configure the access mode and the storage strategy of
/// file-backed byte memory. [`ByteMemory::from_file()`] is an alias for commonly used options.
///
/// Generally speaking, you'll first call [`FileOptions::new`], then chain calls to methods to
/// set each option, then call [`FileOptions::open`], passing the path of the file.
///
/// # Example
///
/// ```no_run
/// use bytemem::{FileAccess, FileOptions};
///
/// let memory = FileOptions::new()
///     .access(FileAccess::Read)
///     .shadow_copy(true)
///     .open("metadata.bin")?;
///
/// println!("loaded {} bytes", memory.len());
/// # Ok::<(), bytemem::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FileOptions {
    access: FileAccess,
    shadow_copy: bool,
    memory_mapping: Option<bool>,
}

impl FileOptions {
    /// Creates a new set of options ready for configuration.
    ///
    /// By default, files are opened for reading, mapped directly without a shadow copy, and
    /// memory mapping is used if [`memory_mapping_supported()`] says so.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            access: FileAccess::Read,
            shadow_copy: false,
            memory_mapping: None,
        }
    }

    /// Sets the access mode required of the resulting byte memory.
    ///
    /// The resulting byte memory is writable if and only if write access is requested, whatever
    /// the storage strategy. If write access is requested, writes through mapped memory modify
    /// the file itself (unless a shadow copy is made).
    pub const fn access(&mut self, access: FileAccess) -> &mut Self {
        self.access = access;
        self
    }

    /// Sets the option to copy the file into private memory.
    ///
    /// This option, when true, copies the contents of the file into an anonymous mapping and
    /// closes the file before returning. The resulting byte memory is decoupled from the file:
    /// the file may be modified, moved or deleted without affecting the bytes. The bytes are
    /// writable only if write access is requested, and writes to them are never persisted.
    pub const fn shadow_copy(&mut self, shadow_copy: bool) -> &mut Self {
        self.shadow_copy = shadow_copy;
        self
    }

    /// Overrides the process-wide decision on whether to use memory mapping.
    ///
    /// When mapping is not used, the whole file is read into heap memory instead.
    pub const fn memory_mapping(&mut self, enabled: bool) -> &mut Self {
        self.memory_mapping = Some(enabled);
        self
    }

    /// Loads the file at `path` into byte memory with the options specified by `self`.
    ///
    /// A mapped file must not be modified by other processes while the byte memory exists,
    /// otherwise the bytes may change unexpectedly. Use a shadow copy to avoid this.
    ///
    /// # Errors
    ///
    /// * [`Error::Io`] if the file cannot be opened, read or mapped, e.g. because it does not
    ///   exist or the user lacks permission for the requested access mode.
    /// * [`Error::InvalidOperation`] if the file does not grant the requested access, e.g. when
    ///   write access is requested for a read-only file.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<ByteMemory> {
        let path = path.as_ref();

        let (file, granted) = self.open_file(path)?;
        ensure_granted(granted, self.access)?;

        if !self.memory_mapping.unwrap_or_else(memory_mapping_supported) {
            return self.read_to_array(path, file);
        }

        let len = file_len(&file)?;
        if len == 0 {
            // Empty files cannot be mapped on every platform and there is nothing to map anyway.
            return Ok(ByteMemory::empty());
        }

        let region = if self.shadow_copy {
            shadow_copy(file, len, self.access.can_write())?
        } else if self.access.can_write() {
            // SAFETY: All access to the mapping goes through the region, which bounds-checks it.
            // Modification of the file by other processes is documented as the caller's concern.
            let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }?;
            RawByteMemory::from_mapping_mut(map, true)?
        } else {
            // SAFETY: See above.
            let map = unsafe { MmapOptions::new().len(len).map(&file) }?;
            RawByteMemory::from_mapping(map)?
        };

        event!(
            Level::DEBUG,
            message = "mapped file into byte memory",
            path = %path.display(),
            len,
            access = %self.access,
            shadow_copy = self.shadow_copy
        );
        MAPPED_SIZE.with(|e| e.observe(len));

        Ok(ByteMemory::from_region(region))
    }

    /// Opens the file, returning it together with the access the file handle grants.
    ///
    /// Write access is only needed from the file itself when its storage is used directly. If the
    /// file cannot be opened for writing, it is opened for reading instead so the caller can
    /// report the access mismatch.
    fn open_file(&self, path: &Path) -> Result<(File, FileAccess)> {
        if self.shadow_copy {
            // The private copy grants whatever access is requested of it.
            return Ok((File::open(path)?, FileAccess::ReadWrite));
        }

        if !self.access.can_write() {
            return Ok((File::open(path)?, FileAccess::Read));
        }

        match fs::OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Ok((file, FileAccess::ReadWrite)),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                event!(
                    Level::DEBUG,
                    message = "file cannot be opened for writing, reopening for reading",
                    path = %path.display()
                );

                Ok((File::open(path)?, FileAccess::Read))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_to_array(&self, path: &Path, mut file: File) -> Result<ByteMemory> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        event!(
            Level::DEBUG,
            message = "memory mapping disabled, read file into heap memory",
            path = %path.display(),
            len = bytes.len(),
            access = %self.access
        );

        // Writable under the same rule as mapped memory.
        let array = ArrayByteMemory::whole(bytes, self.access.can_write());
        Ok(ByteMemory::from_region(Region::Array(array)))
    }
}

impl ByteMemory {
    /// Loads the file at `path` into byte memory.
    ///
    /// The file is memory-mapped if [`memory_mapping_supported()`] and read into heap memory
    /// otherwise. With `shadow_copy`, the contents are copied into private memory and the file
    /// is closed before returning. See [`FileOptions`] for more control.
    ///
    /// # Errors
    ///
    /// See [`FileOptions::open()`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bytemem::{ByteMemory, FileAccess};
    ///
    /// let memory = ByteMemory::from_file("metadata.bin", FileAccess::Read, false)?;
    /// let signature = memory.read_i32(0)?;
    /// # Ok::<(), bytemem::Error>(())
    /// ```
    pub fn from_file(path: impl AsRef<Path>, access: FileAccess, shadow_copy: bool) -> Result<Self> {
        FileOptions::new().access(access).shadow_copy(shadow_copy).open(path)
    }

    /// Copies `bytes` into a new anonymous memory mapping.
    ///
    /// This moves large, long-lived content out of the heap and into memory managed by the
    /// operating system, which may page it out under memory pressure. If memory mapping is not
    /// supported, the bytes are copied into a new heap array instead.
    ///
    /// The result does not share storage with `bytes` and is writable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the mapping cannot be created.
    pub fn create_memory_mapped_file(bytes: &ReadOnlyByteMemory) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::empty());
        }

        if !memory_mapping_supported() {
            event!(
                Level::DEBUG,
                message = "memory mapping disabled, copied bytes into heap memory",
                len = bytes.len()
            );

            return Ok(Self::from_vec(bytes.to_vec()));
        }

        let mut map = MmapOptions::new().len(bytes.len()).map_anon()?;
        map.copy_from_slice(bytes.as_slice());

        MAPPED_SIZE.with(|e| e.observe(bytes.len()));

        Ok(Self::from_region(RawByteMemory::from_mapping_mut(map, true)?))
    }
}

fn file_len(file: &File) -> Result<usize> {
    let len = file.metadata()?.len();
    usize::try_from(len).map_err(|e| Error::invalid_operation(format!("a file of {len} bytes cannot be addressed: {e}")))
}

/// Copies the file into an anonymous mapping, closing the file.
fn shadow_copy(mut file: File, len: usize, writable: bool) -> Result<Region> {
    let mut map = MmapOptions::new().len(len).map_anon()?;
    file.read_exact(&mut map)?;
    drop(file);

    RawByteMemory::from_mapping_mut(map, writable)
}

fn ensure_granted(granted: FileAccess, requested: FileAccess) -> Result<()> {
    if granted.grants(requested) {
        Ok(())
    } else {
        Err(Error::invalid_operation(format!(
            "{requested} access was requested but the memory only grants {granted} access"
        )))
    }
}

const MAPPED_SIZE_BUCKETS: &[Magnitude] = &[
    0, 4096, 65_536, 1_048_576, 16_777_216, 268_435_456, 1_073_741_824,
];

thread_local! {
    static MAPPED_SIZE: Event = Event::builder()
        .name("bytemem_mapped_size")
        .histogram(MAPPED_SIZE_BUCKETS)
        .build();
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = FileOptions::new();

        assert_eq!(options.access, FileAccess::Read);
        assert!(!options.shadow_copy);
        assert!(options.memory_mapping.is_none());
    }

    #[test]
    fn builder_sets_options() {
        let mut options = FileOptions::new();
        options.access(FileAccess::ReadWrite).shadow_copy(true).memory_mapping(false);

        assert_eq!(options.access, FileAccess::ReadWrite);
        assert!(options.shadow_copy);
        assert_eq!(options.memory_mapping, Some(false));
    }

    #[test]
    fn ensure_granted_rejects_missing_access() {
        ensure_granted(FileAccess::ReadWrite, FileAccess::Write).unwrap();
        ensure_granted(FileAccess::Read, FileAccess::Read).unwrap();

        let error = ensure_granted(FileAccess::Read, FileAccess::ReadWrite).unwrap_err();
        assert!(matches!(error, Error::InvalidOperation(_)));
        assert_eq!(
            error.to_string(),
            "invalid operation: read-write access was requested but the memory only grants read access"
        );
    }

    #[test]
    fn memory_mapped_copy() {
        let source = ReadOnlyByteMemory::from(b"mapped".to_vec());
        let mut copy = ByteMemory::create_memory_mapped_file(&source).unwrap();

        assert_eq!(copy.to_vec(), b"mapped");

        // The copy is independent of the (frozen) source.
        copy.set(0, b'M').unwrap();
        assert_eq!(copy.to_vec(), b"Mapped");
        assert_eq!(source.as_slice(), b"mapped");
    }

    #[test]
    fn memory_mapped_copy_of_empty() {
        let copy = ByteMemory::create_memory_mapped_file(&ReadOnlyByteMemory::empty()).unwrap();
        assert!(copy.is_empty());
    }
}
