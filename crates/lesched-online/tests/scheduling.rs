//! End-to-end runs: producer → queue → dispatcher → policy → pool, for
//! every selectable policy, plus the timing-conformance property of the
//! verification schedulers.

use std::sync::Arc;

use lesched_online::{
    build_policy, PolicyKind, ProblemQueue, Scheduler, SeriesProducer, VerificationStats,
};
use lesched_pool::{PoolConfig, WorkerPool};
use lesched_solver::{generate_diagonally_dominant, LinearEquationSeries};

fn small_series(count: usize) -> LinearEquationSeries {
    let mut rng = rand::thread_rng();
    LinearEquationSeries {
        instances: (0..count)
            .map(|i| generate_diagonally_dominant(8 + (i % 3) * 8, &mut rng))
            .collect(),
    }
}

fn run_policy(
    kind: PolicyKind,
    num_threads: usize,
    series: LinearEquationSeries,
) -> Option<Arc<VerificationStats>> {
    let pool = Arc::new(WorkerPool::new(PoolConfig::new(num_threads)));
    let (policy, stats) = build_policy(kind, &pool);

    let queue = Arc::new(ProblemQueue::new());
    let producer = SeriesProducer::spawn(series, f64::MAX, Arc::clone(&queue));
    let scheduler = Scheduler::start(Arc::clone(&queue), Arc::clone(&pool), policy);

    producer.join();
    scheduler.stop();

    assert_eq!(pool.size(), 0);
    assert_eq!(pool.working(), 0);
    stats
}

#[test]
fn trivial_policy_drains_the_series() {
    assert!(run_policy(PolicyKind::Trivial, 2, small_series(20)).is_none());
}

#[test]
fn parallel_policy_drains_the_series() {
    assert!(run_policy(PolicyKind::Parallel, 2, small_series(20)).is_none());
}

#[test]
fn mixed_policy_drains_the_series() {
    assert!(run_policy(PolicyKind::Mixed, 4, small_series(30)).is_none());
}

#[test]
fn size_mixed_policy_drains_the_series() {
    assert!(run_policy(PolicyKind::SizeMixed, 4, small_series(30)).is_none());
}

#[test]
fn verification_a_confirms_recorded_scores() {
    let series = LinearEquationSeries::generate(192, 256, 1.0);
    let stats = run_policy(PolicyKind::VerificationA, 0, series).unwrap();
    let rate = stats.success_percent();
    assert!(rate > 95.0, "success rate {rate}%");
}

#[test]
fn verification_b_confirms_recorded_scores() {
    let series = LinearEquationSeries::generate(192, 256, 1.0);
    let stats = run_policy(PolicyKind::VerificationB, 0, series).unwrap();
    let rate = stats.success_percent();
    assert!(rate > 80.0, "success rate {rate}%");
}
