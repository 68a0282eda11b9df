// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Emits a small binary table into a file and reads it back via a memory mapping.
//!
//! 1. We emit a table of strings with a `ByteBuffer`, patching the entry count into the header
//!    once all entries are written.
//! 2. We save the table to a temporary file and load it with `ByteMemory::from_file()`.
//! 3. We decode the entries from several threads using independent `ByteStream` cursors.
//! 4. We print the metrics collected along the way.

use std::fs;
use std::thread;

use bytemem::{ByteBuffer, ByteMemory, ByteStream, FileAccess, ReadOnlyByteMemory};
use nm::Report;

const ENTRIES: &[&str] = &["alpha", "beta", "gamma", "delta", "epsilon"];

fn main() -> bytemem::Result<()> {
    let table = emit_table(ENTRIES);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("table.bin");
    fs::write(&path, table)?;

    let memory = ByteMemory::from_file(&path, FileAccess::Read, false)?.as_read_only();
    println!("Loaded a table of {} bytes.", memory.len());

    let offsets = entry_offsets(&memory)?;

    thread::scope(|scope| {
        for (index, offset) in offsets.into_iter().enumerate() {
            let memory = memory.clone();
            scope.spawn(move || match read_entry(&memory, offset) {
                Ok(text) => println!("Entry {index} at offset {offset}: {text}"),
                Err(e) => println!("Entry {index} at offset {offset} is corrupt: {e}"),
            });
        }
    });

    // Dump metrics to stdout.
    println!("{}", Report::collect());

    Ok(())
}

/// Layout: entry count (i32), then per entry a length (u16) followed by UTF-8 bytes.
fn emit_table(entries: &[&str]) -> Vec<u8> {
    let mut buffer = ByteBuffer::with_capacity(4);

    let count_pos = buffer.len();
    buffer.emit_i32(0);

    let mut count = 0;
    for entry in entries {
        let Ok(len) = u16::try_from(entry.len()) else {
            continue;
        };

        buffer.emit_u16(len);
        buffer.emit_bytes(entry.as_bytes());
        count += 1;
    }

    buffer.fixup_i32(count_pos, count);
    buffer.close()
}

fn entry_offsets(memory: &ReadOnlyByteMemory) -> bytemem::Result<Vec<usize>> {
    let count = memory.read_i32(0)?;
    let mut offsets = Vec::new();
    let mut offset = 4;

    for _ in 0..count {
        offsets.push(offset);
        offset += 2 + usize::from(memory.read_u16(offset)?);
    }

    Ok(offsets)
}

fn read_entry(memory: &ReadOnlyByteMemory, offset: usize) -> bytemem::Result<String> {
    let len = memory.read_u16(offset)?;
    let mut stream = ByteStream::from_bytes(memory, offset + 2, usize::from(len))?;
    stream.read_utf8_string(usize::from(len))
}
