//! End-to-end pool behavior: completion, distribution across workers,
//! scheduling latency, and shutdown quiescence.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lesched_pool::{PoolConfig, Task, TaskHandle, WorkerPool};

#[test]
fn every_task_runs_exactly_once() {
    let pool = WorkerPool::new(PoolConfig::new(4));
    let results: Arc<Vec<AtomicU64>> = Arc::new((0..100).map(|_| AtomicU64::new(0)).collect());

    for i in 0..100u64 {
        let results = Arc::clone(&results);
        pool.enqueue(Task::new(move |_| {
            results[i as usize].store(i, Ordering::SeqCst);
        }));
    }
    pool.stop();

    let sum: u64 = results.iter().map(|slot| slot.load(Ordering::SeqCst)).sum();
    assert_eq!(sum, 4950);
}

#[test]
fn tasks_spread_across_all_workers() {
    const WORKERS: usize = 128;
    const TASKS: usize = 256;

    let pool = WorkerPool::new(PoolConfig::new(WORKERS));
    let observed: Arc<Vec<AtomicBool>> =
        Arc::new((0..WORKERS).map(|_| AtomicBool::new(false)).collect());

    for _ in 0..TASKS {
        let observed = Arc::clone(&observed);
        pool.enqueue(Task::new(move |tid| {
            observed[tid].store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
        }));
    }
    pool.stop();

    for (tid, seen) in observed.iter().enumerate() {
        assert!(seen.load(Ordering::SeqCst), "worker {tid} never ran a task");
    }
}

#[test]
fn one_task_per_worker_runs_concurrently() {
    const WORKERS: usize = 8;

    let pool = WorkerPool::new(PoolConfig::new(WORKERS));
    let started = Instant::now();
    for _ in 0..WORKERS {
        pool.enqueue(Task::new(|_| thread::sleep(Duration::from_secs(1))));
    }
    pool.stop();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
    assert!(
        elapsed <= Duration::from_millis(1200),
        "scheduling overhead too high: {elapsed:?}"
    );
}

#[test]
fn stop_reaches_quiescence() {
    let pool = WorkerPool::new(PoolConfig::new(4));
    let tasks: Vec<TaskHandle> = (0..200)
        .map(|i| {
            Task::new(move |_| {
                if i % 7 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for (i, task) in tasks.iter().enumerate() {
        match i % 3 {
            0 => pool.enqueue(Arc::clone(task)),
            1 => pool.enqueue_local(Arc::clone(task), i % pool.num_threads()),
            _ => pool.enqueue_round(Arc::clone(task), i),
        }
    }
    pool.stop();

    assert_eq!(pool.size(), 0);
    assert_eq!(pool.working(), 0);
    assert!(tasks.iter().all(|task| task.finished()));
}

#[test]
fn awaiting_caller_observes_task_writes() {
    let pool = WorkerPool::new(PoolConfig::new(2));
    let value = Arc::new(AtomicU64::new(0));
    let task = Task::new({
        let value = Arc::clone(&value);
        move |_| value.store(41, Ordering::SeqCst)
    });
    pool.enqueue(Arc::clone(&task));
    WorkerPool::await_detached(&task);
    assert_eq!(value.load(Ordering::SeqCst), 41);
    pool.stop();
}
