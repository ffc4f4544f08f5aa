//! Bounded lock-free rings for task hand-off.
//!
//! Two fixed shapes cover the pool's needs: a single-producer /
//! multi-consumer ring ([`SpmcRing`]) for the routing side and a
//! multi-producer / single-consumer mirror ([`MpscRing`]) for funnels.
//! Both reserve slots through monotone cursors; a slot becomes visible to
//! the opposite side only after its publication cursor is released, and is
//! not reused until the matching completion cursor advances.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

// Force 128-byte alignment so each cursor owns its cache line pair.
// Adjacent-line prefetching makes a single line of padding insufficient.
#[repr(align(128))]
pub(crate) struct CachePadded<T>(pub(crate) T);

fn slots<T>(capacity: usize) -> Box<[UnsafeCell<Option<T>>]> {
    (0..capacity).map(|_| UnsafeCell::new(None)).collect()
}

/// Single-producer / multi-consumer bounded FIFO ring.
///
/// Cursors: `enqueued` is the producer's publication cursor, `dequeue` the
/// consumers' reservation cursor, `dequeued` the consumers' completion
/// cursor. Capacity is rounded up to a power of two so indices reduce with
/// a mask.
pub struct SpmcRing<T> {
    mask: usize,
    buffer: Box<[UnsafeCell<Option<T>>]>,

    enqueued: CachePadded<AtomicUsize>,
    dequeue: CachePadded<AtomicUsize>,
    dequeued: CachePadded<AtomicUsize>,
}

// Safety: slot access is serialized by the cursor protocol. The producer
// writes a slot before releasing `enqueued`; the consumer that won the
// `dequeue` reservation is the sole reader of that slot, and the slot is
// not rewritten until `dequeued` has moved past it.
unsafe impl<T: Send> Send for SpmcRing<T> {}
unsafe impl<T: Send> Sync for SpmcRing<T> {}

impl<T> SpmcRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            mask: capacity - 1,
            buffer: slots(capacity),
            enqueued: CachePadded(AtomicUsize::new(0)),
            dequeue: CachePadded(AtomicUsize::new(0)),
            dequeued: CachePadded(AtomicUsize::new(0)),
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut Option<T> {
        self.buffer[index & self.mask].get()
    }

    /// Push from the single producer. Fails when the ring is full.
    ///
    /// Not safe for concurrent producers: callers must guarantee one
    /// pushing thread at a time.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let enqueued = self.enqueued.0.load(Ordering::Relaxed);
        let dequeued = self.dequeued.0.load(Ordering::Acquire);
        if enqueued.wrapping_sub(dequeued) > self.mask {
            return Err(item);
        }

        // Safety: single producer, and `dequeued` proves the slot was
        // drained by its previous consumer.
        unsafe { *self.slot(enqueued) = Some(item) };

        self.enqueued.0.store(enqueued.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pop from any consumer thread.
    pub fn try_pop(&self) -> Option<T> {
        let mut dequeue = self.dequeue.0.load(Ordering::Relaxed);
        while dequeue != self.enqueued.0.load(Ordering::Acquire) {
            match self.dequeue.0.compare_exchange_weak(
                dequeue,
                dequeue.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // Safety: the reservation CAS makes this thread the
                    // sole reader of index `dequeue`.
                    let item = unsafe { (*self.slot(dequeue)).take() };

                    // Completion publishes in reservation order; spin until
                    // the slower predecessors have advanced `dequeued`.
                    let mut expected = dequeue;
                    while self
                        .dequeued
                        .0
                        .compare_exchange_weak(
                            expected,
                            dequeue.wrapping_add(1),
                            Ordering::Release,
                            Ordering::Relaxed,
                        )
                        .is_err()
                    {
                        expected = dequeue;
                        std::hint::spin_loop();
                    }
                    return item;
                }
                Err(current) => dequeue = current,
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        let dequeued = self.dequeued.0.load(Ordering::Acquire);
        let enqueued = self.enqueued.0.load(Ordering::Acquire);
        enqueued.wrapping_sub(dequeued)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

/// Multi-producer / single-consumer bounded FIFO ring.
///
/// Mirror of [`SpmcRing`] with the roles swapped: `enqueue` is the
/// producers' reservation cursor, `enqueued` their publication cursor and
/// `dequeued` the consumer's cursor.
pub struct MpscRing<T> {
    mask: usize,
    buffer: Box<[UnsafeCell<Option<T>>]>,

    dequeued: CachePadded<AtomicUsize>,
    enqueued: CachePadded<AtomicUsize>,
    enqueue: CachePadded<AtomicUsize>,
}

// Safety: same cursor protocol as SpmcRing, with the reservation CAS on
// the producer side instead of the consumer side.
unsafe impl<T: Send> Send for MpscRing<T> {}
unsafe impl<T: Send> Sync for MpscRing<T> {}

impl<T> MpscRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            mask: capacity - 1,
            buffer: slots(capacity),
            dequeued: CachePadded(AtomicUsize::new(0)),
            enqueued: CachePadded(AtomicUsize::new(0)),
            enqueue: CachePadded(AtomicUsize::new(0)),
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut Option<T> {
        self.buffer[index & self.mask].get()
    }

    /// Push from any producer thread. Fails when the ring is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut enqueue = self.enqueue.0.load(Ordering::Relaxed);
        loop {
            let dequeued = self.dequeued.0.load(Ordering::Acquire);
            if enqueue.wrapping_sub(dequeued) > self.mask {
                return Err(item);
            }
            match self.enqueue.0.compare_exchange_weak(
                enqueue,
                enqueue.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // Safety: the reservation CAS makes this thread the
                    // sole writer of index `enqueue`.
                    unsafe { *self.slot(enqueue) = Some(item) };

                    let mut expected = enqueue;
                    while self
                        .enqueued
                        .0
                        .compare_exchange_weak(
                            expected,
                            enqueue.wrapping_add(1),
                            Ordering::Release,
                            Ordering::Relaxed,
                        )
                        .is_err()
                    {
                        expected = enqueue;
                        std::hint::spin_loop();
                    }
                    return Ok(());
                }
                Err(current) => enqueue = current,
            }
        }
    }

    /// Pop from the single consumer.
    ///
    /// Not safe for concurrent consumers: callers must guarantee one
    /// popping thread at a time.
    pub fn try_pop(&self) -> Option<T> {
        let dequeued = self.dequeued.0.load(Ordering::Relaxed);
        if self.enqueued.0.load(Ordering::Acquire) == dequeued {
            return None;
        }

        // Safety: single consumer, and `enqueued` proves the slot was
        // published by its producer.
        let item = unsafe { (*self.slot(dequeued)).take() };

        self.dequeued.0.store(dequeued.wrapping_add(1), Ordering::Release);
        item
    }

    pub fn len(&self) -> usize {
        let dequeued = self.dequeued.0.load(Ordering::Acquire);
        let enqueued = self.enqueued.0.load(Ordering::Acquire);
        enqueued.wrapping_sub(dequeued)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}
