//! Solver bodies wrapped as pool tasks.
//!
//! Each constructor pairs a task handle with a result cell the awaiter can
//! drain after completion. A singular system is recorded in the cell (and
//! logged) rather than tearing the pool down: pool tasks always complete.

use std::sync::{Arc, Mutex};

use lesched_pool::{Task, TaskHandle, WorkerPool};
use tracing::warn;

use crate::equation::LinearEquation;
use crate::error::SolverError;
use crate::{gauss, lu};

pub type SolveResult = Result<Vec<f64>, SolverError>;

/// Hand-off slot for a task's solution, written exactly once by the task
/// body. Reading before the task finished returns `None`.
#[derive(Default)]
pub struct ResultCell {
    result: Mutex<Option<SolveResult>>,
}

impl ResultCell {
    fn put(&self, result: SolveResult) {
        if let Err(err) = &result {
            warn!(%err, "solver task failed");
        }
        *self.result.lock().unwrap() = Some(result);
    }

    pub fn take(&self) -> Option<SolveResult> {
        self.result.lock().unwrap().take()
    }
}

/// Serial blocked LU as a pool task.
pub fn lu_task(le: LinearEquation) -> (TaskHandle, Arc<ResultCell>) {
    let cell = Arc::new(ResultCell::default());
    let task = Task::new({
        let cell = Arc::clone(&cell);
        move |_| cell.put(lu::solve(le))
    });
    (task, cell)
}

/// Parallel blocked LU as a pool task. The body fans `A22` rows (and the
/// `U12` update) back into the same pool from whichever worker runs it.
pub fn lu_parallel_task(le: LinearEquation, pool: Arc<WorkerPool>) -> (TaskHandle, Arc<ResultCell>) {
    let cell = Arc::new(ResultCell::default());
    let task = Task::new({
        let cell = Arc::clone(&cell);
        move |tid| cell.put(lu::solve_parallel(le, &pool, tid))
    });
    (task, cell)
}

/// Gaussian elimination as a pool task.
pub fn gauss_task(le: LinearEquation) -> (TaskHandle, Arc<ResultCell>) {
    let cell = Arc::new(ResultCell::default());
    let task = Task::new({
        let cell = Arc::clone(&cell);
        move |_| cell.put(gauss::solve(le))
    });
    (task, cell)
}
