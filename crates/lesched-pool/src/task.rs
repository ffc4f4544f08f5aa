//! Single-shot unit of execution.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type TaskBody = Box<dyn FnOnce(usize) + Send + 'static>;

/// Shared handle to a task: the enqueuer keeps one side for awaiting, the
/// pool container holds the other until a worker takes it.
pub type TaskHandle = Arc<Task>;

/// A run-at-most-once callable with a completion flag and a pool-assigned
/// id.
///
/// The body is consumed on the first `run`; a second `run` is a programmer
/// error and panics. `finished` is published with release ordering after
/// the body returns, so an awaiter that observes it (acquire) also observes
/// every write the body made.
pub struct Task {
    finished: AtomicBool,
    id: AtomicU64,
    body: Mutex<Option<TaskBody>>,
}

impl Task {
    /// Wrap a closure into a shareable task. The argument passed to the
    /// closure is the id of the worker thread that runs it.
    pub fn new(body: impl FnOnce(usize) + Send + 'static) -> TaskHandle {
        Arc::new(Self {
            finished: AtomicBool::new(false),
            id: AtomicU64::new(0),
            body: Mutex::new(Some(Box::new(body))),
        })
    }

    /// Run the task body on worker `tid` and publish completion.
    pub fn run(&self, tid: usize) {
        let body = self
            .body
            .lock()
            .unwrap()
            .take()
            .expect("task already performed; tasks are not reusable");
        body(tid);
        self.finished.store(true, Ordering::Release);
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Monotone id assigned by the pool on enqueue; zero before that.
    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Relaxed)
    }

    pub(crate) fn set_id(&self, id: u64) {
        self.id.store(id, Ordering::Relaxed);
    }
}
