// src/core/queue.rs

//! A bounded, lock-free multi-producer single-consumer queue used as each
//! session's inbound pub/sub mailbox: any number of publisher strands can
//! push concurrently while the owning session's strand drains it alone.
//!
//! Generalized from a single-producer ring buffer (cache-line-padded slots,
//! sequence-number-tagged cells) to the Vyukov bounded-queue protocol, which
//! extends the same idea to multiple producers without a lock: each slot
//! carries its own sequence number, and producers race a compare-exchange on
//! the tail counter rather than taking a mutex.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(align(64))]
struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded lock-free queue. Capacity is rounded up to the next power of two.
pub struct InboundQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: AtomicUsize,
    dequeue_pos: AtomicUsize,
}

unsafe impl<T: Send> Send for InboundQueue<T> {}
unsafe impl<T: Send> Sync for InboundQueue<T> {}

impl<T> InboundQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let buffer: Box<[Slot<T>]> = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            buffer,
            mask: capacity - 1,
            enqueue_pos: AtomicUsize::new(0),
            dequeue_pos: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Attempts to push an item without blocking. Returns `false` (dropping
    /// `item`) if the queue is full.
    pub fn try_push(&self, item: T) -> bool {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            match diff.cmp(&0) {
                std::cmp::Ordering::Equal => {
                    if self
                        .enqueue_pos
                        .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                        .is_ok()
                    {
                        unsafe {
                            (*slot.value.get()).write(item);
                        }
                        slot.sequence.store(pos + 1, Ordering::Release);
                        return true;
                    }
                    pos = self.enqueue_pos.load(Ordering::Relaxed);
                }
                std::cmp::Ordering::Less => return false, // full
                std::cmp::Ordering::Greater => pos = self.enqueue_pos.load(Ordering::Relaxed),
            }
        }
    }

    /// Attempts to pop an item without blocking. Only safe to call from a
    /// single consumer at a time (matches the session-strand usage pattern);
    /// concurrent consumers would still be memory-safe but could reorder
    /// deliveries relative to the strand's processing order.
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;

            match diff.cmp(&0) {
                std::cmp::Ordering::Equal => {
                    if self
                        .dequeue_pos
                        .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                        .is_ok()
                    {
                        let item = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence.store(pos + self.mask + 1, Ordering::Release);
                        return Some(item);
                    }
                    pos = self.dequeue_pos.load(Ordering::Relaxed);
                }
                std::cmp::Ordering::Less => return None, // empty
                std::cmp::Ordering::Greater => pos = self.dequeue_pos.load(Ordering::Relaxed),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let dequeue = self.dequeue_pos.load(Ordering::Relaxed);
        let slot = &self.buffer[dequeue & self.mask];
        let seq = slot.sequence.load(Ordering::Acquire);
        seq as isize - (dequeue + 1) as isize != 0
    }
}

impl<T> Drop for InboundQueue<T> {
    /// Drains and drops any items still queued; `MaybeUninit` slots don't
    /// run `T`'s destructor on their own, so an un-popped `Bytes`/`Arc`
    /// payload would otherwise leak its refcount.
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_roundtrip() {
        let q = InboundQueue::with_capacity(4);
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn rejects_push_when_full() {
        let q = InboundQueue::with_capacity(2);
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert!(!q.try_push(3));
        assert_eq!(q.try_pop(), Some(1));
        assert!(q.try_push(3));
    }

    #[test]
    fn concurrent_producers_deliver_all_items() {
        let q = Arc::new(InboundQueue::with_capacity(1024));
        let mut handles = Vec::new();
        for t in 0..4 {
            let q = q.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    while !q.try_push(t * 100 + i) {
                        thread::yield_now();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut count = 0;
        while q.try_pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 400);
    }
}
