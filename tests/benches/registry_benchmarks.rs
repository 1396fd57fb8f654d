//! # Request Registry Benchmarks
//!
//! | Operation | Path | Target |
//! |-----------|------|--------|
//! | `insert_if_absent` | every `publish_request` | < 1µs |
//! | `compute_if_present` | every query and response | < 1µs |
//! | `remove_stale` | every `publish_request` | linear in live entries |
//! | `ResponseDispatcher::receive` | every response | < 2µs with waiters |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use request_api::{
    ExpiringMap, ManualTimeSource, RequestId, RequestStats, ResponseDispatcher, ResponseHandlers,
    Waiter,
};
use std::sync::Arc;
use std::time::Duration;

type Registry = ExpiringMap<RequestId, ResponseHandlers<u64>>;

fn registry(clock: Arc<ManualTimeSource>) -> Registry {
    ExpiringMap::new(Duration::from_secs(60), clock).expect("valid retention")
}

fn filled(clock: Arc<ManualTimeSource>, size: usize) -> (Registry, Vec<RequestId>) {
    let map = registry(clock);
    let ids: Vec<RequestId> = (0..size).map(|_| RequestId::new()).collect();
    for id in &ids {
        map.insert_if_absent(*id, ResponseHandlers::awaiting);
    }
    (map, ids)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry-insert");
    let clock = Arc::new(ManualTimeSource::new(0));

    group.bench_function("insert_if_absent_fresh", |b| {
        let map = registry(Arc::clone(&clock));
        b.iter(|| black_box(map.insert_if_absent(RequestId::new(), ResponseHandlers::awaiting)))
    });

    group.bench_function("insert_if_absent_existing", |b| {
        let (map, ids) = filled(Arc::clone(&clock), 1);
        b.iter(|| black_box(map.insert_if_absent(ids[0], ResponseHandlers::awaiting)))
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry-lookup");
    let clock = Arc::new(ManualTimeSource::new(0));

    for size in [100, 10_000] {
        let (map, ids) = filled(Arc::clone(&clock), size);
        group.bench_with_input(BenchmarkId::new("compute_if_present", size), &ids, |b, ids| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % ids.len();
                black_box(map.compute_if_present(&ids[i], |h| h.is_resolved()))
            })
        });
    }

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry-sweep");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));

        // Nothing expired: the cost every publish pays
        group.bench_with_input(BenchmarkId::new("remove_stale_none", size), &size, |b, &size| {
            let clock = Arc::new(ManualTimeSource::new(0));
            let (map, _ids) = filled(Arc::clone(&clock), size);
            b.iter(|| black_box(map.remove_stale(|_, _| {})))
        });

        group.bench_with_input(BenchmarkId::new("remove_stale_all", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let clock = Arc::new(ManualTimeSource::new(0));
                    let (map, _ids) = filled(Arc::clone(&clock), size);
                    clock.advance(Duration::from_secs(61));
                    map
                },
                |map| black_box(map.remove_stale(|_, _| {})),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatcher");

    for waiters in [0usize, 1, 8] {
        group.bench_with_input(
            BenchmarkId::new("receive", waiters),
            &waiters,
            |b, &waiters| {
                b.iter_batched(
                    || {
                        let clock = Arc::new(ManualTimeSource::new(0));
                        let map = Arc::new(registry(clock));
                        let id = RequestId::new();
                        map.insert_if_absent(id, ResponseHandlers::awaiting);
                        let futures: Vec<_> = (0..waiters)
                            .map(|_| {
                                let (waiter, future) = Waiter::new(Duration::from_secs(1));
                                map.compute_if_present(&id, |h| h.attach(waiter));
                                future
                            })
                            .collect();
                        let dispatcher =
                            ResponseDispatcher::new(map, Arc::new(RequestStats::default()));
                        (dispatcher, id, futures)
                    },
                    |(dispatcher, id, futures)| {
                        black_box(dispatcher.receive(id, 42));
                        futures
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_sweep, bench_dispatch);
criterion_main!(benches);
