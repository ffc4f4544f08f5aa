//! Work-stealing worker pool.
//!
//! N workers each own a bounded local ring plus an unbounded overflow
//! stack; unplaced work lands in a shared global ring. Idle workers steal
//! from peers before sleeping on the pool condvar. Callers that must wait
//! for a task can participate as workers ([`WorkerPool::await_task`]), so
//! fan-out never deadlocks even on a single-worker pool.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::ring::SpmcRing;
use crate::stack::LockedStack;
use crate::task::{Task, TaskHandle};
use crate::trace::{trace_path, write_trace, TraceRecord};

/// Capacity of each worker-local ring.
const LOCAL_RING_CAPACITY: usize = 2048;
/// Global ring capacity per worker.
const GLOBAL_RING_SLOTS_PER_WORKER: usize = 256;

/// Explicit pool configuration. The trace suffix replaces any process-wide
/// naming state: workers dump `t<i>_<suffix>.dump` only when it is set.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_threads: usize,
    pub pin_workers: bool,
    pub trace_suffix: Option<String>,
}

impl PoolConfig {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            pin_workers: false,
            trace_suffix: None,
        }
    }

    pub fn pinned(mut self) -> Self {
        self.pin_workers = true;
        self
    }

    pub fn with_trace_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.trace_suffix = Some(suffix.into());
        self
    }
}

/// Per-worker wall-clock totals, published when the worker exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStats {
    pub elapsed_s: f64,
    pub running_s: f64,
}

impl WorkerStats {
    pub fn waiting_s(&self) -> f64 {
        (self.elapsed_s - self.running_s).max(0.0)
    }
}

/// State shared between the workers and every enqueuing or awaiting thread.
struct PoolShared {
    num_threads: usize,
    pin_workers: bool,
    trace_suffix: Option<String>,

    /// Landing zone for unplaced tasks. Single producer in steady state
    /// (the dispatcher), consumed by every worker.
    injector: SpmcRing<TaskHandle>,
    /// One ring per worker for placed tasks and sub-task fan-out.
    local: Vec<SpmcRing<TaskHandle>>,
    /// The local rings' producer side admits one pusher at a time, but the
    /// dispatcher (round-robin placement) and the owning worker (fan-out)
    /// can race on the same ring; this serializes them. The pop/steal side
    /// stays lock-free.
    local_push: Vec<Mutex<()>>,
    /// Unbounded spill per worker when the rings reject.
    overflow: Vec<LockedStack<TaskHandle>>,

    /// Tasks across all containers. Incremented before the container push
    /// so it can never be observed below the true count.
    size: AtomicUsize,
    /// Workers (and awaiters) currently scanning or holding a task.
    working: AtomicUsize,
    stop: AtomicBool,
    next_task_id: AtomicU64,

    /// Wakeup channel for idle workers. Notifiers take the lock before
    /// signalling so a wakeup cannot fall between a worker's emptiness
    /// check and its wait.
    wakeup: Mutex<()>,
    wakeup_cv: Condvar,

    /// Reference instant for trace timestamps.
    epoch: Instant,
    stats: Mutex<Vec<WorkerStats>>,
}

impl PoolShared {
    fn notify_one(&self) {
        drop(self.wakeup.lock().unwrap());
        self.wakeup_cv.notify_one();
    }

    fn notify_all(&self) {
        drop(self.wakeup.lock().unwrap());
        self.wakeup_cv.notify_all();
    }

    /// Scan for runnable work from worker `tid`, in fixed order: own local
    /// ring (twice, to amortize interleaving with its producer), own
    /// overflow, global ring, then peer overflows and peer locals in
    /// rotation.
    fn try_pop(&self, tid: usize) -> Option<TaskHandle> {
        for _ in 0..2 {
            if let Some(task) = self.local[tid].try_pop() {
                self.size.fetch_sub(1, Ordering::AcqRel);
                return Some(task);
            }
        }
        if let Some(task) = self.overflow[tid].try_pop() {
            self.size.fetch_sub(1, Ordering::AcqRel);
            return Some(task);
        }
        if self.size.load(Ordering::Acquire) == 0 {
            return None;
        }
        if let Some(task) = self.injector.try_pop() {
            self.size.fetch_sub(1, Ordering::AcqRel);
            return Some(task);
        }
        for offset in 1..self.num_threads {
            let victim = (tid + offset) % self.num_threads;
            if let Some(task) = self.overflow[victim].try_pop() {
                self.size.fetch_sub(1, Ordering::AcqRel);
                return Some(task);
            }
        }
        for offset in 1..self.num_threads {
            let victim = (tid + offset) % self.num_threads;
            if let Some(task) = self.local[victim].try_pop() {
                self.size.fetch_sub(1, Ordering::AcqRel);
                return Some(task);
            }
        }
        None
    }
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `config.num_threads` workers. A zero-worker pool is legal for
    /// callers that only run tasks inline.
    pub fn new(config: PoolConfig) -> Self {
        let num_threads = config.num_threads;
        let shared = Arc::new(PoolShared {
            num_threads,
            pin_workers: config.pin_workers,
            trace_suffix: config.trace_suffix,
            injector: SpmcRing::new(num_threads * GLOBAL_RING_SLOTS_PER_WORKER),
            local: (0..num_threads)
                .map(|_| SpmcRing::new(LOCAL_RING_CAPACITY))
                .collect(),
            local_push: (0..num_threads).map(|_| Mutex::new(())).collect(),
            overflow: (0..num_threads).map(|_| LockedStack::new()).collect(),
            size: AtomicUsize::new(0),
            working: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            next_task_id: AtomicU64::new(1),
            wakeup: Mutex::new(()),
            wakeup_cv: Condvar::new(),
            epoch: Instant::now(),
            stats: Mutex::new(vec![WorkerStats::default(); num_threads]),
        });

        let mut workers = Vec::with_capacity(num_threads);
        for tid in 0..num_threads {
            let shared = Arc::clone(&shared);
            workers.push(
                thread::Builder::new()
                    .name(format!("lesched-worker-{tid}"))
                    .spawn(move || worker_loop(&shared, tid))
                    .expect("failed to spawn worker thread"),
            );
        }

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    // Enqueues racing `stop` are legal: a draining worker only exits once
    // `size` and `working` are both zero, so children fanned out by still
    // running tasks are executed before the join. Enqueueing after `stop`
    // has *returned* loses the task and is a programmer error.
    fn prepare(&self, task: &TaskHandle) {
        debug_assert!(!task.finished(), "enqueue of a finished task");
        debug_assert!(
            self.shared.num_threads > 0,
            "enqueue on a pool with no workers"
        );
        task.set_id(self.shared.next_task_id.fetch_add(1, Ordering::Relaxed));
        self.shared.size.fetch_add(1, Ordering::Release);
    }

    /// Enqueue without a placement hint: global ring first, then the least
    /// loaded overflow stack (an empty one wins immediately).
    pub fn enqueue(&self, task: TaskHandle) {
        self.prepare(&task);
        if let Err(task) = self.shared.injector.try_push(task) {
            let overflow = &self.shared.overflow;
            let mut min_index = 0;
            let mut min_size = usize::MAX;
            for (index, stack) in overflow.iter().enumerate() {
                let size = stack.size_hint();
                if size == 0 {
                    min_index = index;
                    break;
                }
                if size < min_size {
                    min_index = index;
                    min_size = size;
                }
            }
            overflow[min_index].push(task);
        }
        self.shared.notify_one();
    }

    /// Enqueue onto worker `tid`'s local ring, spilling to its overflow
    /// stack when the ring is full.
    pub fn enqueue_local(&self, task: TaskHandle, tid: usize) {
        debug_assert!(tid < self.shared.num_threads, "placement hint out of range");
        self.prepare(&task);
        {
            let _producer = self.shared.local_push[tid].lock().unwrap();
            if let Err(task) = self.shared.local[tid].try_push(task) {
                self.shared.overflow[tid].push(task);
            }
        }
        self.shared.notify_one();
    }

    /// Round-robin placement: `round % num_threads`.
    pub fn enqueue_round(&self, task: TaskHandle, round: usize) {
        self.enqueue_local(task, round % self.shared.num_threads);
    }

    /// Wait for `task` while participating as worker `tid`: gap tasks are
    /// popped and run inline, otherwise the CPU is yielded. Never blocks,
    /// so a parent may consume its own fanned-out children even when the
    /// pool has a single worker.
    pub fn await_task(&self, task: &Task, tid: usize) {
        debug_assert!(tid < self.shared.num_threads, "await hint out of range");
        while !task.finished() {
            if let Some(gap_task) = self.shared.try_pop(tid) {
                self.shared.working.fetch_add(1, Ordering::AcqRel);
                gap_task.run(tid);
                self.shared.working.fetch_sub(1, Ordering::AcqRel);
                // Workers parked in the stop protocol count this thread in
                // `working`; wake them so they can re-check quiescence.
                if self.shared.stop.load(Ordering::Acquire) {
                    self.shared.notify_all();
                }
            } else {
                thread::yield_now();
            }
        }
    }

    /// Yield-only wait for callers that are not pool workers.
    pub fn await_detached(task: &Task) {
        while !task.finished() {
            thread::yield_now();
        }
    }

    /// Signal stop and join every worker. Workers drain all containers
    /// before exiting, so every enqueued task is finished once this
    /// returns. Idempotent; also invoked by `Drop`.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.notify_all();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }

        debug_assert_eq!(self.size(), 0);
        debug_assert_eq!(self.working(), 0);
    }

    pub fn stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Tasks across all containers. Transiently stale outside quiescence.
    pub fn size(&self) -> usize {
        self.shared.size.load(Ordering::Acquire)
    }

    /// Workers currently scanning for or holding a task.
    pub fn working(&self) -> usize {
        self.shared.working.load(Ordering::Acquire)
    }

    /// Workers with nothing to do. A stale hint, only good for biasing
    /// placement decisions.
    pub fn idle_hint(&self) -> usize {
        self.shared.num_threads.saturating_sub(self.working())
    }

    pub fn num_threads(&self) -> usize {
        self.shared.num_threads
    }

    /// Per-worker totals; meaningful after `stop` returned.
    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.shared.stats.lock().unwrap().clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.stopped() {
            self.stop();
        }
    }
}

fn worker_loop(shared: &Arc<PoolShared>, tid: usize) {
    if shared.pin_workers {
        pin_to_core(tid % num_cpus::get());
    }
    debug!(tid, "worker started");

    let started = Instant::now();
    let mut running = Duration::ZERO;
    let collect_trace = shared.trace_suffix.is_some();
    let mut trace: Vec<TraceRecord> = Vec::new();

    shared.working.fetch_add(1, Ordering::AcqRel);
    'dispatch: loop {
        while let Some(task) = shared.try_pop(tid) {
            let run_started = Instant::now();
            task.run(tid);
            let duration = run_started.elapsed();
            running += duration;
            if collect_trace {
                trace.push(TraceRecord {
                    task_id: task.id(),
                    start_ns: run_started.duration_since(shared.epoch).as_nanos() as u64,
                    duration_ns: duration.as_nanos() as u64,
                });
            }
        }

        // Every container came up empty: go idle. The exit condition is
        // re-checked under the wakeup lock so the last worker out can wake
        // the rest.
        shared.working.fetch_sub(1, Ordering::AcqRel);
        let mut guard = shared.wakeup.lock().unwrap();
        loop {
            if shared.stop.load(Ordering::Acquire)
                && shared.working.load(Ordering::Acquire) == 0
                && shared.size.load(Ordering::Acquire) == 0
            {
                drop(guard);
                shared.notify_all();
                break 'dispatch;
            }
            if shared.size.load(Ordering::Acquire) > 0 {
                break;
            }
            guard = shared.wakeup_cv.wait(guard).unwrap();
        }
        drop(guard);
        shared.working.fetch_add(1, Ordering::AcqRel);
    }

    let elapsed = started.elapsed();
    shared.stats.lock().unwrap()[tid] = WorkerStats {
        elapsed_s: elapsed.as_secs_f64(),
        running_s: running.as_secs_f64(),
    };

    if let Some(suffix) = &shared.trace_suffix {
        let path = trace_path(tid, suffix);
        if let Err(err) = write_trace(&path, &trace) {
            warn!(tid, %err, "failed to write worker trace");
        }
    }
    debug!(tid, tasks = trace.len(), "worker stopped");
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpus = CpuSet::new();
    if cpus.set(core).is_err() {
        warn!(core, "core index outside CpuSet range");
        return;
    }
    if let Err(err) = sched_setaffinity(Pid::from_raw(0), &cpus) {
        warn!(core, %err, "failed to pin worker thread");
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_core: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_enqueued_task() {
        let pool = WorkerPool::new(PoolConfig::new(2));
        let hits = Arc::new(AtomicUsize::new(0));
        let task = Task::new({
            let hits = Arc::clone(&hits);
            move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });
        pool.enqueue(Arc::clone(&task));
        WorkerPool::await_detached(&task);
        assert!(task.finished());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        pool.stop();
    }

    #[test]
    fn assigns_monotone_ids() {
        let pool = WorkerPool::new(PoolConfig::new(1));
        let first = Task::new(|_| {});
        let second = Task::new(|_| {});
        pool.enqueue(Arc::clone(&first));
        pool.enqueue(Arc::clone(&second));
        pool.stop();
        assert!(first.id() >= 1);
        assert!(second.id() > first.id());
    }

    #[test]
    fn stop_is_idempotent() {
        let pool = WorkerPool::new(PoolConfig::new(2));
        pool.stop();
        pool.stop();
        assert!(pool.stopped());
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn round_robin_placement_wraps() {
        let pool = WorkerPool::new(PoolConfig::new(2));
        for round in 0..8 {
            pool.enqueue_round(Task::new(|_| {}), round);
        }
        pool.stop();
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn fan_out_completes_on_single_worker() {
        // A parent that spawns more children than the pool has workers
        // must make progress by consuming them from await_task.
        let pool = Arc::new(WorkerPool::new(PoolConfig::new(1)));
        let sum = Arc::new(AtomicUsize::new(0));

        let parent = Task::new({
            let pool = Arc::clone(&pool);
            let sum = Arc::clone(&sum);
            move |tid| {
                let children: Vec<TaskHandle> = (0..64)
                    .map(|i| {
                        let sum = Arc::clone(&sum);
                        Task::new(move |_| {
                            sum.fetch_add(i, Ordering::SeqCst);
                        })
                    })
                    .collect();
                for child in &children {
                    pool.enqueue_local(Arc::clone(child), tid);
                }
                for child in children.iter().rev() {
                    pool.await_task(child, tid);
                }
            }
        });

        pool.enqueue(Arc::clone(&parent));
        WorkerPool::await_detached(&parent);
        pool.stop();
        assert_eq!(sum.load(Ordering::SeqCst), (0..64).sum());
    }
}
