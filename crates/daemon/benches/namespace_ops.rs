//! Performance benchmarks for namespace operations.
//!
//! These benchmarks measure the hot paths of every request:
//! - Path resolution and containment checks
//! - Directory listing and ordering
//! - Envelope encoding and decoding

use std::fs;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filehub::namespace::guard;
use filehub::namespace::{EntryLister, Root};
use protocol::messages::{Entry, ListResponse};
use protocol::{decode_line, encode_line, Envelope, Message};
use tempfile::TempDir;

/// Benchmark client path resolution.
fn bench_resolve(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let root = Root::open(temp_dir.path(), false).unwrap();

    let mut group = c.benchmark_group("resolve");

    for (label, path) in [
        ("root", ""),
        ("shallow", "docs/report.txt"),
        ("deep", "a/b/c/d/e/f/g/h/i/j/file.txt"),
        ("dotted", "a/./b/../c//d/../../e.txt"),
        ("traversal", "a/../../../etc/passwd"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(label), path, |b, path| {
            b.iter(|| root.resolve(black_box(path)))
        });
    }

    group.finish();
}

/// Benchmark the lexical containment gate.
fn bench_contains(c: &mut Criterion) {
    let root = Path::new("/srv/filehub/uploads");
    let inside = Path::new("/srv/filehub/uploads/a/b/../c/file.txt");
    let outside = Path::new("/srv/filehub/uploads/a/../../secrets");

    c.bench_function("contains/inside", |b| {
        b.iter(|| guard::contains(black_box(root), black_box(inside)))
    });
    c.bench_function("contains/outside", |b| {
        b.iter(|| guard::contains(black_box(root), black_box(outside)))
    });
}

/// Benchmark listing directories of increasing size.
fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");

    for count in [10usize, 100, 1000] {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..count {
            if i % 5 == 0 {
                fs::create_dir(temp_dir.path().join(format!("Dir{:04}", i))).unwrap();
            } else {
                fs::write(temp_dir.path().join(format!("file{:04}.txt", i)), "x").unwrap();
            }
        }

        let root = Root::open(temp_dir.path(), false).unwrap();
        let lister = EntryLister::new(root.clone());
        let resolved = root.resolved();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| lister.list(black_box(&resolved)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark encoding a large listing response.
fn bench_codec(c: &mut Criterion) {
    let entries: Vec<Entry> = (0..1000)
        .map(|i| Entry {
            name: format!("file{:04}.txt", i),
            is_directory: i % 5 == 0,
            size: i * 17,
            modified: 1_700_000_000 + i,
        })
        .collect();
    let envelope = Envelope::new(
        1,
        Message::ListResponse(ListResponse {
            path: "docs".to_string(),
            entries,
        }),
    );
    let line = encode_line(&envelope).unwrap();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(line.len() as u64));
    group.bench_function("encode_list_1000", |b| {
        b.iter(|| encode_line(black_box(&envelope)).unwrap())
    });
    group.bench_function("decode_list_1000", |b| {
        b.iter(|| decode_line(black_box(&line)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_contains, bench_list, bench_codec);
criterion_main!(benches);
