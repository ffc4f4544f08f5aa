//! Mutex-guarded LIFO used as the pool's unbounded overflow container.
//!
//! LIFO order is intentional: freshly fanned-out sub-tasks run before older
//! queued work, which keeps a parent task's data hot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Unbounded MPMC stack with an atomic size hint for lock-free fast checks.
///
/// The hint is only mutated while the lock is held, so it never dips below
/// zero; it may lag the true size between the hint read and the lock.
pub struct LockedStack<T> {
    items: Mutex<Vec<T>>,
    size_hint: AtomicUsize,
}

impl<T> Default for LockedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LockedStack<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            size_hint: AtomicUsize::new(0),
        }
    }

    /// Push, blocking on the lock.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        self.size_hint.fetch_add(1, Ordering::Release);
        items.push(item);
    }

    /// Push only if the lock is uncontended.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        match self.items.try_lock() {
            Ok(mut items) => {
                self.size_hint.fetch_add(1, Ordering::Release);
                items.push(item);
                Ok(())
            }
            Err(_) => Err(item),
        }
    }

    /// Pop the most recently pushed item. Returns `None` on an empty hint,
    /// lock contention, or an empty stack.
    pub fn try_pop(&self) -> Option<T> {
        if self.is_empty_hint() {
            return None;
        }
        let mut items = self.items.try_lock().ok()?;
        let item = items.pop()?;
        self.size_hint.fetch_sub(1, Ordering::Release);
        Some(item)
    }

    pub fn size_hint(&self) -> usize {
        self.size_hint.load(Ordering::Acquire)
    }

    pub fn is_empty_hint(&self) -> bool {
        self.size_hint() == 0
    }
}
