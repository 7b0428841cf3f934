// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

//! Frame decoder throughput.
//!
//! Measures:
//! - FrameDecoder over one encoded reply cut into chunks of various sizes
//! - Frame encoding cost for the same reply
//!
//! Run: cargo bench --bench decode_throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use genrelay::stream::{DecodeStep, Frame, FrameDecoder};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A reply of `n` short deltas, mixed ASCII and multi-byte text.
fn deltas(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 4 {
            0 => format!("token{i} "),
            1 => "héllo ".to_string(),
            2 => "数据流 ".to_string(),
            _ => "🚀\n".to_string(),
        })
        .collect()
}

fn encoded(deltas: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for d in deltas {
        out.extend_from_slice(&Frame::content(d.as_str()).encode().unwrap());
    }
    out.extend_from_slice(&Frame::done().encode().unwrap());
    out
}

fn decode_all(bytes: &[u8], chunk_size: usize) -> usize {
    let mut decoder = FrameDecoder::new();
    decoder.begin();
    let mut total = 0;
    for chunk in bytes.chunks(chunk_size) {
        for step in decoder.push(chunk) {
            if let DecodeStep::Complete(text) = step {
                total = text.len();
            }
        }
    }
    total
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_decode_chunked(c: &mut Criterion) {
    let bytes = encoded(&deltas(1_000));
    let mut group = c.benchmark_group("decode_chunked");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    // 1 byte splits every multi-byte character; 64 KiB is effectively whole.
    for chunk_size in [1usize, 7, 64, 1024, 64 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &size| b.iter(|| decode_all(black_box(&bytes), size)),
        );
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let reply = deltas(1_000);
    c.bench_function("encode_1000_frames", |b| {
        b.iter(|| encoded(black_box(&reply)).len())
    });
}

criterion_group!(benches, bench_decode_chunked, bench_encode);
criterion_main!(benches);
