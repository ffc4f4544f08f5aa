//! Work-stealing worker pool and the lock-free containers underneath it.
//!
//! The pool routes tasks through three kinds of containers: a global
//! single-producer ring for unplaced work, one bounded ring per worker for
//! placed work and sub-task fan-out, and one mutex-guarded overflow stack
//! per worker for everything the rings reject. Workers steal across all of
//! them in a fixed rotation, and any thread holding a task handle can wait
//! for it while running other pool work in the gaps.

mod pool;
mod ring;
mod stack;
mod task;
pub mod trace;

pub use pool::{PoolConfig, WorkerPool, WorkerStats};
pub use ring::{MpscRing, SpmcRing};
pub use stack::LockedStack;
pub use task::{Task, TaskHandle};
