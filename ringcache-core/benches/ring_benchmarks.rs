//! Ring lookup and replicated write benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ringcache_core::{CacheManager, ConsistentHashRing, VNodeManager, DEFAULT_SHARDS};
use serde_json::json;
use std::sync::Arc;

fn bench_ring_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_lookup");

    for vnodes in [16, 256, 4096].iter() {
        let mut ring = ConsistentHashRing::default();
        for i in 0..*vnodes {
            ring.add_point(&format!("vnode-{}", i));
        }

        group.bench_with_input(BenchmarkId::new("next_point", vnodes), vnodes, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                ring.immediate_next_point(black_box(&format!("key-{}", i)))
                    .map(str::len)
            });
        });

        group.bench_with_input(BenchmarkId::new("next_3_points", vnodes), vnodes, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                ring.immediate_next_n_points(black_box(&format!("key-{}", i)), 3)
            });
        });
    }

    group.finish();
}

fn bench_replicated_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("replicated_ops");

    for replication_count in [1, 3, 5].iter() {
        let manager = Arc::new(VNodeManager::new());
        for i in 0..64 {
            manager
                .add_vnode(&format!("vnode-{}", i), DEFAULT_SHARDS[i % DEFAULT_SHARDS.len()])
                .unwrap();
        }
        let cache = CacheManager::with_replication_count(manager, *replication_count);

        group.bench_with_input(
            BenchmarkId::new("add", replication_count),
            replication_count,
            |b, _| {
                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    cache.add(black_box(&format!("key-{}", i % 10_000)), json!(i), None)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("get", replication_count),
            replication_count,
            |b, _| {
                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    cache.get(black_box(&format!("key-{}", i % 10_000)))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_ring_lookup, bench_replicated_ops);
criterion_main!(benches);
