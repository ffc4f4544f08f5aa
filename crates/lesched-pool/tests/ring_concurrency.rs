//! Multiset correctness of the rings under real contention: nothing lost,
//! nothing duplicated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use lesched_pool::{MpscRing, SpmcRing};

const VALUES: usize = 256;
const CONSUMERS: usize = 16;
const PRODUCERS: usize = 16;
const CAPACITY: usize = 16;

#[test]
fn spmc_one_producer_many_consumers() {
    let ring = Arc::new(SpmcRing::new(CAPACITY));
    let produced_all = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let ring = Arc::clone(&ring);
            let produced_all = Arc::clone(&produced_all);
            thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    if let Some(value) = ring.try_pop() {
                        seen.push(value);
                    } else if produced_all.load(Ordering::Acquire) && ring.is_empty() {
                        break;
                    } else {
                        thread::yield_now();
                    }
                }
                seen
            })
        })
        .collect();

    for value in 0..VALUES {
        while ring.try_push(value).is_err() {
            thread::yield_now();
        }
    }
    produced_all.store(true, Ordering::Release);

    let mut merged: Vec<usize> = consumers
        .into_iter()
        .flat_map(|consumer| consumer.join().unwrap())
        .collect();
    merged.sort_unstable();
    assert_eq!(merged, (0..VALUES).collect::<Vec<_>>());
}

#[test]
fn mpsc_many_producers_one_consumer() {
    let ring = Arc::new(MpscRing::new(CAPACITY));
    let per_producer = VALUES / PRODUCERS;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for offset in 0..per_producer {
                    let value = producer * per_producer + offset;
                    while ring.try_push(value).is_err() {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let mut merged = Vec::with_capacity(VALUES);
    while merged.len() < VALUES {
        match ring.try_pop() {
            Some(value) => merged.push(value),
            None => thread::yield_now(),
        }
    }
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(ring.is_empty());
    merged.sort_unstable();
    assert_eq!(merged, (0..VALUES).collect::<Vec<_>>());
}

#[test]
fn mpsc_preserves_per_producer_order() {
    let ring = Arc::new(MpscRing::new(CAPACITY));
    let producers: Vec<_> = (0..4)
        .map(|producer: usize| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for sequence in 0..64usize {
                    while ring.try_push((producer, sequence)).is_err() {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let mut last_seen = [None::<usize>; 4];
    let mut popped = 0;
    while popped < 4 * 64 {
        if let Some((producer, sequence)) = ring.try_pop() {
            // FIFO per producer even when producers interleave.
            assert!(last_seen[producer].map_or(true, |last| last < sequence));
            last_seen[producer] = Some(sequence);
            popped += 1;
        } else {
            thread::yield_now();
        }
    }
    for producer in producers {
        producer.join().unwrap();
    }
}
