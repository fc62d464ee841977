//! Enumerator benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use enumdb_bench::random_keys;
use enumdb_core::{
    DurableStringEnumerator, Enumerator, EnumeratorConfig, EnumeratorFactory, Id, IndexKind,
    StringCodec,
};
use tempfile::TempDir;

fn factory(kind: IndexKind) -> EnumeratorFactory {
    EnumeratorFactory::new(EnumeratorConfig::new().index_kind(kind))
}

/// Benchmark first-sight enumeration (log append plus index insert).
fn bench_enumerate_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate_new");
    let keys = random_keys(10_000, 16);
    group.throughput(Throughput::Elements(keys.len() as u64));

    for kind in [IndexKind::InMemory, IndexKind::Durable] {
        group.bench_function(BenchmarkId::from_parameter(format!("{kind:?}")), |b| {
            b.iter(|| {
                let names = factory(kind).open_in_memory(StringCodec).unwrap();
                for key in &keys {
                    black_box(names.enumerate(key).unwrap());
                }
            });
        });
    }

    group.bench_function("string_variant", |b| {
        b.iter(|| {
            let names = DurableStringEnumerator::in_memory().unwrap();
            for key in &keys {
                black_box(names.enumerate_str(key).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark lookups of keys that already have ids.
fn bench_enumerate_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate_existing");
    let keys = random_keys(10_000, 16);

    for kind in [IndexKind::InMemory, IndexKind::Durable] {
        let names = factory(kind).open_in_memory(StringCodec).unwrap();
        for key in &keys {
            names.enumerate(key).unwrap();
        }

        group.bench_function(BenchmarkId::from_parameter(format!("{kind:?}")), |b| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % keys.len();
                black_box(names.enumerate(black_box(&keys[i])).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark misses, which never touch the log unless hashes collide.
fn bench_try_enumerate_miss(c: &mut Criterion) {
    let names = factory(IndexKind::Durable)
        .open_in_memory(StringCodec)
        .unwrap();
    for key in random_keys(10_000, 16) {
        names.enumerate(&key).unwrap();
    }
    let misses = random_keys(1_000, 17);

    c.bench_function("try_enumerate_miss", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % misses.len();
            black_box(names.try_enumerate(black_box(&misses[i])).unwrap())
        });
    });
}

/// Benchmark reverse lookups.
fn bench_value_of(c: &mut Criterion) {
    let names = factory(IndexKind::InMemory)
        .open_in_memory(StringCodec)
        .unwrap();
    for key in random_keys(10_000, 16) {
        names.enumerate(&key).unwrap();
    }

    c.bench_function("value_of", |b| {
        let mut raw = 0u32;
        b.iter(|| {
            raw = raw % 10_000 + 1;
            black_box(names.value_of(Id::new(raw)).unwrap())
        });
    });
}

/// Benchmark reopening a populated store: replay versus a persisted index.
fn bench_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen");
    group.sample_size(20);

    for count in [1_000usize, 10_000] {
        for kind in [IndexKind::InMemory, IndexKind::Durable] {
            let temp_dir = TempDir::new().unwrap();
            let base = temp_dir.path().join("names");
            {
                let names = factory(kind).open(&base, StringCodec).unwrap();
                for key in random_keys(count, 16) {
                    names.enumerate(&key).unwrap();
                }
                names.close().unwrap();
            }

            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}"), count),
                &base,
                |b, base| {
                    b.iter(|| {
                        let names = factory(kind).open(base, StringCodec).unwrap();
                        black_box(names.len());
                        names.close().unwrap();
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_enumerate_new,
    bench_enumerate_existing,
    bench_try_enumerate_miss,
    bench_value_of,
    bench_reopen,
);

criterion_main!(benches);
