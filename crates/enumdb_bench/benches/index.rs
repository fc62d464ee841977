//! Index and log benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use enumdb_bench::random_hashes;
use enumdb_core::{AppendLog, DurableHashMap, DurableLog, Id, InMemoryMultiMap, IntMultiMap};

fn fill(map: &dyn IntMultiMap, hashes: &[i32]) {
    for (i, &hash) in hashes.iter().enumerate() {
        map.put(hash, Id::new(i as u32 + 1)).unwrap();
    }
}

/// Benchmark inserts, growth included for the durable table.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_put");
    let hashes = random_hashes(10_000);
    group.throughput(Throughput::Elements(hashes.len() as u64));

    group.bench_function("in_memory", |b| {
        b.iter(|| fill(&InMemoryMultiMap::new(), &hashes));
    });
    group.bench_function("durable", |b| {
        b.iter(|| fill(&DurableHashMap::in_memory(16).unwrap(), &hashes));
    });

    group.finish();
}

/// Benchmark successful lookups.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_lookup");
    let hashes = random_hashes(10_000);

    let maps: [(&str, Box<dyn IntMultiMap>); 2] = [
        ("in_memory", Box::new(InMemoryMultiMap::new())),
        ("durable", Box::new(DurableHashMap::in_memory(16).unwrap())),
    ];
    for (name, map) in &maps {
        fill(map.as_ref(), &hashes);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % hashes.len();
                black_box(map.lookup(hashes[i], &mut |_| Ok(true)).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark key log appends and reads.
fn bench_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("log");

    for size in [16usize, 256] {
        let payload = vec![0x5a; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("append", size), &payload, |b, payload| {
            let log = AppendLog::in_memory().unwrap();
            b.iter(|| black_box(log.append(black_box(payload)).unwrap()));
        });

        let log = AppendLog::in_memory().unwrap();
        for _ in 0..1_000 {
            log.append(&payload).unwrap();
        }
        group.bench_function(BenchmarkId::new("read", size), |b| {
            let mut raw = 0u32;
            b.iter(|| {
                raw = raw % 1_000 + 1;
                black_box(log.read(Id::new(raw)).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put, bench_lookup, bench_log);
criterion_main!(benches);
