// crates/velocut-core/src/queue.rs
//
// Fixed-capacity blocking FIFO shared by every stage of the pipeline:
// decoded audio chunks, decoded video frames, demuxed packets and the task
// runner's work list all sit in one of these.
//
// Blocking model:
//   push() parks while full, pop() parks while empty. Neither has a timeout.
//   flush() wakes blocked pushers but NOT a thread parked inside pop() — a
//   consumer that must be released during shutdown needs an explicit sentinel
//   pushed after the flush (see TaskRunner::abort).
//
// Callers must not hold other locks while blocked in push/pop.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

pub struct BoundedQueue<T> {
    inner:     Mutex<Inner<T>>,
    /// Signalled when an item is appended.
    not_empty: Condvar,
    /// Signalled when space frees up (pop, flush, resize).
    not_full:  Condvar,
}

struct Inner<T> {
    items:    VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue that holds at most `capacity` items.
    ///
    /// Panics if `capacity` is zero — a zero-capacity queue would block every
    /// push forever.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue::new — capacity must be > 0");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
            }),
            not_empty: Condvar::new(),
            not_full:  Condvar::new(),
        }
    }

    /// Append `item` at the tail, parking the caller while the queue is full.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        while inner.items.len() >= inner.capacity {
            self.not_full.wait(&mut inner);
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Remove and return the head item, parking the caller while empty.
    pub fn pop(&self) -> T {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Non-blocking pop. Returns `None` when nothing is queued.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.inner.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Change the capacity. `new_capacity` must exceed the current size;
    /// anything else is a caller bug and panics.
    pub fn resize(&self, new_capacity: usize) {
        let mut inner = self.inner.lock();
        assert!(
            new_capacity > inner.items.len(),
            "BoundedQueue::resize — new capacity {} must exceed current size {}",
            new_capacity,
            inner.items.len(),
        );
        let grew = new_capacity > inner.capacity;
        inner.capacity = new_capacity;
        drop(inner);
        if grew {
            self.not_full.notify_all();
        }
    }

    /// Drop every queued item and release all blocked pushers.
    pub fn flush(&self) {
        let dropped = {
            let mut inner = self.inner.lock();
            std::mem::take(&mut inner.items)
        };
        self.not_full.notify_all();
        if !dropped.is_empty() {
            log::debug!("[queue] flushed {} item(s)", dropped.len());
        }
        // `dropped` is released here, outside the lock — item destructors
        // (frames, tasks) may be arbitrarily expensive.
    }

    /// Snapshot of the current occupancy. Stale as soon as it returns under
    /// concurrent use; intended for status display only.
    pub fn size(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pop_returns_items_in_push_order() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.size(), 3);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
        assert_eq!(q.pop(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn third_push_blocks_until_a_pop() {
        let q = Arc::new(BoundedQueue::new(2));
        let pushed_third = Arc::new(AtomicBool::new(false));

        let producer = {
            let q = Arc::clone(&q);
            let flag = Arc::clone(&pushed_third);
            thread::spawn(move || {
                q.push("a");
                q.push("b");
                q.push("c");
                flag.store(true, Ordering::SeqCst);
            })
        };

        // Give the producer ample time to reach the third push.
        thread::sleep(Duration::from_millis(100));
        assert!(!pushed_third.load(Ordering::SeqCst), "third push should still be blocked");
        assert_eq!(q.size(), 2);

        assert_eq!(q.pop(), "a");
        producer.join().unwrap();
        assert!(pushed_third.load(Ordering::SeqCst));

        assert_eq!(q.pop(), "b");
        assert_eq!(q.pop(), "c");
    }

    #[test]
    fn pop_blocks_until_push_from_other_thread() {
        let q = Arc::new(BoundedQueue::new(1));
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop())
        };
        thread::sleep(Duration::from_millis(50));
        q.push(42u32);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn flush_empties_queue_and_releases_blocked_pusher() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push(0);
        let pusher = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push(1))
        };
        thread::sleep(Duration::from_millis(50));
        q.flush();
        pusher.join().unwrap();
        // The released pusher's item is the only one left.
        assert_eq!(q.size(), 1);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn flush_on_empty_queue_is_harmless() {
        let q: BoundedQueue<u8> = BoundedQueue::new(3);
        q.flush();
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn resize_releases_blocked_pusher() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push(0);
        let pusher = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push(1))
        };
        thread::sleep(Duration::from_millis(50));
        q.resize(2);
        pusher.join().unwrap();
        assert_eq!(q.capacity(), 2);
        assert_eq!(q.size(), 2);
    }

    #[test]
    #[should_panic(expected = "must exceed current size")]
    fn resize_to_current_size_panics() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.resize(2);
    }

    #[test]
    fn try_pop_on_empty_returns_none() {
        let q: BoundedQueue<i32> = BoundedQueue::new(2);
        assert_eq!(q.try_pop(), None);
        q.push(7);
        assert_eq!(q.try_pop(), Some(7));
    }
}
