// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![expect(missing_docs, reason = "Benchmark code")]

use std::hint::black_box;

use bytemem::{ByteBuffer, ByteMemory, ByteStream, ReadOnlyByteMemory};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const TEST_DATA_LEN: usize = 64 * 1024;

fn entrypoint(c: &mut Criterion) {
    let test_data: Vec<u8> = (0..TEST_DATA_LEN).map(|i| (i % 251) as u8).collect();

    let writable = ByteMemory::from_vec(test_data.clone());
    let read_only = ReadOnlyByteMemory::from(test_data.clone());
    let mapped = ByteMemory::create_memory_mapped_file(&read_only).unwrap();

    let mut group = c.benchmark_group("ByteMemory");

    group.bench_function("read_i32_array", |b| {
        b.iter(|| writable.read_i32(black_box(1024)).unwrap());
    });

    group.bench_function("read_i32_mapped", |b| {
        b.iter(|| mapped.read_i32(black_box(1024)).unwrap());
    });

    group.bench_function("slice", |b| {
        b.iter(|| writable.slice(black_box(100), black_box(1000)).unwrap());
    });

    group.bench_function("to_vec_writable", |b| {
        b.iter(|| writable.to_vec());
    });

    group.bench_function("copy_to_writable", |b| {
        b.iter_batched_ref(
            || Vec::with_capacity(TEST_DATA_LEN),
            |out| writable.copy_to(out).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("copy_to_read_only", |b| {
        b.iter_batched_ref(
            || Vec::with_capacity(TEST_DATA_LEN),
            |out| read_only.copy_to(out).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.finish();

    let mut group = c.benchmark_group("ByteStream");

    group.bench_function("read_byte_all", |b| {
        b.iter_batched_ref(
            || ByteStream::from_bytes(&read_only, 0, TEST_DATA_LEN).unwrap(),
            |stream| {
                while let Ok(byte) = stream.read_byte() {
                    black_box(byte);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("read_bytes_chunks", |b| {
        b.iter_batched_ref(
            || ByteStream::from_bytes(&read_only, 0, TEST_DATA_LEN).unwrap(),
            |stream| {
                while let Ok(chunk) = stream.read_bytes(1024) {
                    black_box(chunk);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();

    let mut group = c.benchmark_group("ByteBuffer");

    group.bench_function("emit_i32_many", |b| {
        b.iter(|| {
            let mut buffer = ByteBuffer::new();
            for i in 0..1024 {
                buffer.emit_i32(black_box(i));
            }
            buffer.close()
        });
    });

    group.bench_function("emit_bytes_bulk", |b| {
        b.iter(|| {
            let mut buffer = ByteBuffer::new();
            buffer.emit_bytes(black_box(&test_data));
            buffer.close()
        });
    });

    group.bench_function("emit_byte_memory", |b| {
        b.iter(|| {
            let mut buffer = ByteBuffer::new();
            buffer.emit_byte_memory(black_box(&writable));
            buffer.close()
        });
    });

    group.finish();
}
