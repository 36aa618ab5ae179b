//! Benchmarks for row canonicalization, hashing, and full delivery processing.
//!
//! Benchmark targets:
//! - Canonicalize + hash one row: <5us
//! - Deduplicate a 1,000-row delivery against a warm store: <10ms

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use chrono::{TimeDelta, TimeZone, Utc};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use logdedup::Row;
use logdedup::services::deduplication::{
    ContentHasher, CsvDeduplicator, DEFAULT_EXCLUDED_COLUMNS, DeduplicationConfig,
    RowCanonicalizer,
};
use std::hint::black_box;
use std::time::Duration;

fn log_row(i: usize) -> Row {
    Row::from_pairs([
        ("timestamp", format!("2024-01-01T10:{:02}:{:02}Z", (i / 60) % 60, i % 60)),
        ("host", format!("web-{}", i % 8)),
        ("level", "INFO".to_string()),
        ("message", format!("GET /api/v1/items/{i} 200 {}ms", i % 250)),
        ("user_agent", "Mozilla/5.0 (X11; Linux x86_64)".to_string()),
    ])
}

fn bench_digest_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest_row");
    let canonicalizer = RowCanonicalizer::new(DEFAULT_EXCLUDED_COLUMNS.iter().copied());
    let row = log_row(42);

    group.bench_function("canonicalize", |b| {
        b.iter(|| canonicalizer.canonicalize(black_box(&row)));
    });

    group.bench_function("canonicalize_and_hash", |b| {
        b.iter(|| ContentHasher::digest_row(black_box(&row), &canonicalizer));
    });

    group.finish();
}

fn bench_deduplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("deduplicate");
    group.measurement_time(Duration::from_secs(5));
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

    for size in [100usize, 1_000] {
        let dir = tempfile::TempDir::new().unwrap();
        let config =
            DeduplicationConfig::default().with_storage_path(dir.path().join("hashes.json"));
        let previous: Vec<Row> = (0..size).map(log_row).collect();
        // Half the delivery overlaps the previous one.
        let delivery: Vec<Row> = (size / 2..size + size / 2).map(log_row).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &delivery, |b, delivery| {
            b.iter_batched(
                || {
                    let mut dedup = CsvDeduplicator::new(config.clone());
                    dedup.deduplicate(previous.clone(), DEFAULT_EXCLUDED_COLUMNS, now);
                    (dedup, delivery.clone())
                },
                |(mut dedup, rows)| {
                    dedup.deduplicate(rows, DEFAULT_EXCLUDED_COLUMNS, now + TimeDelta::minutes(1))
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_digest_row, bench_deduplicate);
criterion_main!(benches);
