//! Ring hand-off throughput against crossbeam's `ArrayQueue` baseline.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use crossbeam::queue::ArrayQueue;
use lesched_pool::{MpscRing, SpmcRing};

const BATCH: usize = 1024;

fn bench_ring_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_roundtrip");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("spmc", |b| {
        let ring = SpmcRing::new(BATCH);
        b.iter(|| {
            for i in 0..BATCH {
                ring.try_push(black_box(i)).unwrap();
            }
            for _ in 0..BATCH {
                black_box(ring.try_pop());
            }
        });
    });

    group.bench_function("mpsc", |b| {
        let ring = MpscRing::new(BATCH);
        b.iter(|| {
            for i in 0..BATCH {
                ring.try_push(black_box(i)).unwrap();
            }
            for _ in 0..BATCH {
                black_box(ring.try_pop());
            }
        });
    });

    group.bench_function("crossbeam_array_queue", |b| {
        let queue = ArrayQueue::new(BATCH);
        b.iter(|| {
            for i in 0..BATCH {
                queue.push(black_box(i)).unwrap();
            }
            for _ in 0..BATCH {
                black_box(queue.pop());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ring_roundtrip);
criterion_main!(benches);
