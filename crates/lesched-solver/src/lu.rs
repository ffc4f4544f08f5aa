//! Blocked LU factorization with partial pivoting, serial and parallel.

use std::sync::Arc;

use lesched_pool::{Task, TaskHandle, WorkerPool};

use crate::equation::LinearEquation;
use crate::error::SolverError;
use crate::kernel::{
    back_substitution, eliminate_panel_column, forward_substitution, partial_pivot, update_a22,
    update_a22_row, update_l21, update_u12,
};

/// Panel width of the serial factorization.
pub const SERIAL_BLOCK: usize = 4;
/// Panel width of the parallel factorization. Wider panels amortize the
/// fan-out overhead of the trailing update.
pub const PARALLEL_BLOCK: usize = 16;

/// Serial blocked LU solve. Consumes the instance; factors land in `a` and
/// the permuted right-hand side in `b`.
pub fn solve(mut le: LinearEquation) -> Result<Vec<f64>, SolverError> {
    let n = le.n;
    let a = le.a.as_mut_slice();
    let b = le.b.as_mut_slice();

    let mut i = 0;
    while i < n {
        let ib = SERIAL_BLOCK.min(n - i);

        // factorize panel A[i:n][i:i+ib]
        for k in i..i + ib {
            partial_pivot(a, b, n, k)?;
            eliminate_panel_column(a, n, k, i, ib);
        }

        update_u12(a, n, i, ib);
        update_l21(a, n, i, ib);
        update_a22(a, n, i, ib);

        i += ib;
    }

    let y = forward_substitution(a, b, n);
    back_substitution(a, &y, n)
}

/// Raw shared view of the matrix buffer handed to sub-tasks.
///
/// Safety contract: concurrent users write disjoint row/column blocks, and
/// the parent awaits every child before touching the same region again.
#[derive(Clone, Copy)]
struct MatrixWindow {
    data: *mut f64,
    len: usize,
}

// Safety: disjointness is guaranteed by the factorization schedule above;
// the window itself adds no shared state beyond the buffer.
unsafe impl Send for MatrixWindow {}
unsafe impl Sync for MatrixWindow {}

impl MatrixWindow {
    fn new(a: &mut [f64]) -> Self {
        Self {
            data: a.as_mut_ptr(),
            len: a.len(),
        }
    }

    /// Safety: the caller must hold exclusive access to the elements it
    /// reads or writes through the returned slice.
    unsafe fn slice<'a>(self) -> &'a mut [f64] {
        std::slice::from_raw_parts_mut(self.data, self.len)
    }
}

/// Parallel blocked LU solve, run from worker `tid` of `pool`.
///
/// The panel itself is factored inline. Per panel, `U12` is pushed to a
/// sibling worker while `L21` runs locally, and the trailing `A22` update
/// fans out one task per row onto this worker's local ring. Children are
/// awaited newest-first so the parent consumes its own fan-out instead of
/// blocking, which keeps a single-worker pool deadlock-free.
pub fn solve_parallel(
    mut le: LinearEquation,
    pool: &Arc<WorkerPool>,
    tid: usize,
) -> Result<Vec<f64>, SolverError> {
    let n = le.n;
    let window = MatrixWindow::new(&mut le.a);
    let b = le.b.as_mut_slice();

    let mut i = 0;
    while i < n {
        let ib = PARALLEL_BLOCK.min(n - i);

        // Safety: no sub-task is in flight between awaits, so the window
        // is exclusively the parent's here.
        let a = unsafe { window.slice() };
        for k in i..i + ib {
            partial_pivot(a, b, n, k)?;
            eliminate_panel_column(a, n, k, i, ib);
        }

        // U12 overlaps with L21: the sub-task owns the panel rows right
        // of the panel, the parent the rows below it. Whoever is idle
        // steals the U12 task; otherwise the await below runs it inline.
        let u12 = Task::new(move |_| {
            update_u12(unsafe { window.slice() }, n, i, ib);
        });
        pool.enqueue_round(Arc::clone(&u12), tid);
        update_l21(unsafe { window.slice() }, n, i, ib);
        pool.await_task(&u12, tid);

        if i + ib < n {
            let children: Vec<TaskHandle> = (i + ib..n)
                .map(|r| {
                    Task::new(move |_| {
                        // Safety: this task is row r's only writer.
                        update_a22_row(unsafe { window.slice() }, n, r, i, ib);
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

        i += ib;
    }

    let a = unsafe { window.slice() };
    let y = forward_substitution(a, b, n);
    back_substitution(a, &y, n)
}
