//! Scheduling policies: given a problem and the pool state, decide between
//! one serial task and one fan-out parallel task, and where to place it.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lesched_pool::WorkerPool;
use lesched_solver::{lu, lu_parallel_task, lu_task, LinearEquation};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Policy hook invoked by the dispatcher for every arriving problem.
/// `queued` is the queue depth left behind the popped problem. The policy
/// enqueues zero or more tasks and returns immediately; it never awaits.
pub trait Policy: Send {
    fn on_linear_equation(&mut self, le: LinearEquation, queued: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    VerificationA,
    VerificationB,
    Trivial,
    Parallel,
    Mixed,
    SizeMixed,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 6] = [
        PolicyKind::VerificationA,
        PolicyKind::VerificationB,
        PolicyKind::Trivial,
        PolicyKind::Parallel,
        PolicyKind::Mixed,
        PolicyKind::SizeMixed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::VerificationA => "verification_a",
            PolicyKind::VerificationB => "verification_b",
            PolicyKind::Trivial => "trivial",
            PolicyKind::Parallel => "parallel",
            PolicyKind::Mixed => "mixed",
            PolicyKind::SizeMixed => "size_mixed",
        }
    }

    /// Verification schedulers solve inline on the dispatch thread and
    /// ignore the worker count.
    pub fn is_verification(self) -> bool {
        matches!(self, PolicyKind::VerificationA | PolicyKind::VerificationB)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("unknown scheduler '{0}' (expected one of: verification_a, verification_b, trivial, parallel, mixed, size_mixed)")]
pub struct UnknownPolicy(String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| UnknownPolicy(name.to_string()))
    }
}

/// Success/failure counters of a verification run.
#[derive(Debug, Default)]
pub struct VerificationStats {
    success: AtomicUsize,
    failure: AtomicUsize,
}

impl VerificationStats {
    fn record(&self, success: bool) {
        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn success_percent(&self) -> f64 {
        let success = self.success.load(Ordering::Relaxed);
        let failure = self.failure.load(Ordering::Relaxed);
        if success + failure == 0 {
            return f64::NAN;
        }
        success as f64 * 100.0 / (success + failure) as f64
    }
}

/// Instantiate the policy behind `kind`; verification kinds also return
/// their shared counters.
pub fn build_policy(
    kind: PolicyKind,
    pool: &Arc<WorkerPool>,
) -> (Box<dyn Policy>, Option<Arc<VerificationStats>>) {
    match kind {
        PolicyKind::Trivial => (Box::new(TrivialPolicy::new(Arc::clone(pool))), None),
        PolicyKind::Parallel => (Box::new(ParallelPolicy::new(Arc::clone(pool))), None),
        PolicyKind::Mixed => (Box::new(MixedPolicy::new(Arc::clone(pool))), None),
        PolicyKind::SizeMixed => (Box::new(SizeMixedPolicy::new(Arc::clone(pool))), None),
        PolicyKind::VerificationA | PolicyKind::VerificationB => {
            let policy = VerificationPolicy::new(kind);
            let stats = policy.stats();
            (Box::new(policy), Some(stats))
        }
    }
}

/// Always one serial task, no placement hint.
pub struct TrivialPolicy {
    pool: Arc<WorkerPool>,
}

impl TrivialPolicy {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }
}

impl Policy for TrivialPolicy {
    fn on_linear_equation(&mut self, le: LinearEquation, _queued: usize) {
        let (task, _result) = lu_task(le);
        self.pool.enqueue(task);
    }
}

/// Always one parallel task; the fan-out finds idle workers on its own.
pub struct ParallelPolicy {
    pool: Arc<WorkerPool>,
}

impl ParallelPolicy {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }
}

impl Policy for ParallelPolicy {
    fn on_linear_equation(&mut self, le: LinearEquation, _queued: usize) {
        let (task, _result) = lu_parallel_task(le, Arc::clone(&self.pool));
        self.pool.enqueue(task);
    }
}

/// Serial while the backlog covers the idle capacity, parallel otherwise.
/// With a deep queue, serial-per-problem maximizes throughput (no fan-out
/// synchronization); with idle workers, fanning out cuts latency.
pub struct MixedPolicy {
    pool: Arc<WorkerPool>,
    round: usize,
}

impl MixedPolicy {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool, round: 0 }
    }
}

impl Policy for MixedPolicy {
    fn on_linear_equation(&mut self, le: LinearEquation, queued: usize) {
        // idle_hint is a stale read; a wrong guess only mislays placement.
        let serial = self.pool.idle_hint().saturating_sub(1) <= queued;
        debug!(n = le.n, queued, serial, "mixed dispatch");

        let (task, _result) = if serial {
            lu_task(le)
        } else {
            lu_parallel_task(le, Arc::clone(&self.pool))
        };
        self.pool.enqueue_round(task, self.round);
        self.round += 1;
    }
}

/// Problem-size aware variant of [`MixedPolicy`]: large systems go
/// parallel when there is spare capacity, huge systems always do.
pub struct SizeMixedPolicy {
    pool: Arc<WorkerPool>,
    round: usize,
}

impl SizeMixedPolicy {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool, round: 0 }
    }
}

impl Policy for SizeMixedPolicy {
    fn on_linear_equation(&mut self, le: LinearEquation, queued: usize) {
        let spare = queued < self.pool.num_threads() || self.pool.idle_hint() > 0;
        let parallel = (le.n >= 1024 && spare) || le.n >= 2048;
        debug!(n = le.n, queued, parallel, "size_mixed dispatch");

        let (task, _result) = if parallel {
            lu_parallel_task(le, Arc::clone(&self.pool))
        } else {
            lu_task(le)
        };
        self.pool.enqueue_round(task, self.round);
        self.round += 1;
    }
}

/// Test-harness policy: solve inline on the dispatch thread and check the
/// wall-clock against the recorded score band `(0.8·score, 1.25·score)`.
/// Variant A calls the kernel directly, variant B routes through the task
/// machinery.
pub struct VerificationPolicy {
    kind: PolicyKind,
    stats: Arc<VerificationStats>,
}

impl VerificationPolicy {
    pub fn new(kind: PolicyKind) -> Self {
        debug_assert!(kind.is_verification());
        Self {
            kind,
            stats: Arc::new(VerificationStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<VerificationStats> {
        Arc::clone(&self.stats)
    }
}

impl Policy for VerificationPolicy {
    fn on_linear_equation(&mut self, le: LinearEquation, _queued: usize) {
        let score = le.score;

        let started = Instant::now();
        match self.kind {
            PolicyKind::VerificationA => {
                if let Err(err) = lu::solve(le) {
                    warn!(%err, "verification solve failed");
                }
            }
            _ => {
                let (task, result) = lu_task(le);
                task.run(0);
                drop(result.take());
            }
        }
        let elapsed = started.elapsed().as_secs_f64();

        let success = elapsed < score * 1.25 && elapsed > score * 0.8;
        self.stats.record(success);
        info!(score, elapsed, success, "verification sample");
    }
}
