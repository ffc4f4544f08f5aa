//! The dispatch thread: sole consumer of the problem queue.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use lesched_pool::WorkerPool;
use tracing::info;

use crate::policy::Policy;
use crate::queue::ProblemQueue;

/// Pulls problems off the queue and hands each to the policy. The policy
/// enqueues pool work and returns; the dispatcher never awaits tasks.
pub struct Scheduler {
    queue: Arc<ProblemQueue>,
    pool: Arc<WorkerPool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(
        queue: Arc<ProblemQueue>,
        pool: Arc<WorkerPool>,
        mut policy: Box<dyn Policy>,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("lesched-dispatch".to_string())
            .spawn({
                let queue = Arc::clone(&queue);
                move || {
                    let started = Instant::now();
                    while let Some((le, queued)) = queue.wait_pop() {
                        info!(
                            t = started.elapsed().as_secs_f64(),
                            n = le.n,
                            score = le.score,
                            queued,
                            "dispatching problem"
                        );
                        policy.on_linear_equation(le, queued);
                    }
                }
            })
            .expect("failed to spawn dispatch thread");

        Self {
            queue,
            pool,
            handle: Some(handle),
        }
    }

    /// Close the queue, join the dispatcher once it has drained, then stop
    /// the pool (which drains its containers in turn). Call after the
    /// producer has finished.
    pub fn stop(mut self) {
        self.queue.close();
        if let Some(handle) = self.handle.take() {
            handle.join().expect("dispatch thread panicked");
        }
        self.pool.stop();
    }
}
