//! Benchmarks for the restriction filter.
//!
//! Measures how quickly a raw query is checked against the blocklist blob.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};

use dnsgate::filter::Blocklist;

fn blob() -> String {
    (0..200)
        .map(|i| format!("tracker{i}.example"))
        .collect::<Vec<_>>()
        .join(",")
}

fn bench_is_restricted(c: &mut Criterion) {
    let blocklist = Blocklist::new(blob());

    let mut group = c.benchmark_group("blocklist");
    group.throughput(Throughput::Elements(1));

    // Match near the start of the blob
    group.bench_function(BenchmarkId::new("is_restricted", "early_match"), |b| {
        b.iter(|| blocklist.is_restricted(black_box(b"tracker1.example")))
    });

    // Match at the end of the blob
    group.bench_function(BenchmarkId::new("is_restricted", "late_match"), |b| {
        b.iter(|| blocklist.is_restricted(black_box(b"tracker199.example")))
    });

    // Miss: scans the whole blob
    group.bench_function(BenchmarkId::new("is_restricted", "miss"), |b| {
        b.iter(|| blocklist.is_restricted(black_box(b"www.google.com")))
    });

    // Wire-format query, the common case in practice
    let wire = b"\x12\x34\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
        \x07example\x03com\x00\x00\x01\x00\x01";
    group.bench_function(BenchmarkId::new("is_restricted", "wire_query"), |b| {
        b.iter(|| blocklist.is_restricted(black_box(wire)))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_is_restricted(&mut criterion);
    criterion.final_summary();
}
