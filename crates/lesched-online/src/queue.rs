//! Hand-off queue between the producer and the scheduler dispatcher.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use lesched_solver::LinearEquation;

struct QueueState {
    queue: VecDeque<LinearEquation>,
    closed: bool,
}

/// Condvar-protected FIFO of arriving problems. One producer, one
/// consumer (the dispatch thread).
pub struct ProblemQueue {
    state: Mutex<QueueState>,
    cv: Condvar,
}

impl Default for ProblemQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ProblemQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn push(&self, le: LinearEquation) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(!state.closed, "push into a closed problem queue");
        state.queue.push_back(le);
        drop(state);
        self.cv.notify_one();
    }

    /// Close the queue: `wait_pop` drains what is left, then reports the
    /// end of the series.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.cv.notify_all();
    }

    /// Block until a problem arrives or the queue is closed and drained.
    /// Returns the problem together with the depth left behind it.
    pub fn wait_pop(&self) -> Option<(LinearEquation, usize)> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(le) = state.queue.pop_front() {
                let queued = state.queue.len();
                return Some((le, queued));
            }
            if state.closed {
                return None;
            }
            state = self.cv.wait(state).unwrap();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
