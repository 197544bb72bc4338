//! The bounded FIFO connecting adjacent operators in a physical plan.
//!
//! Every operator runs on its own thread and is joined to its parent by one
//! of these: a fixed-capacity queue of tuples with blocking push/pop. A
//! producer blocks once the buffer is full; a consumer blocks once it's
//! empty. `Tuple::End` is pushed once, by the producer, to signal that no
//! further tuples are coming — consumers stop pulling the moment they see
//! it rather than blocking forever on an empty buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::common::Tuple;

/// An item flowing through a `BoundedBuffer`: either a result row or the
/// end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Row(Tuple),
    End,
}

struct Inner {
    queue: Mutex<VecDeque<StreamItem>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

/// A blocking, fixed-capacity queue of `StreamItem`s shared between one
/// producer operator thread and one consumer operator thread.
#[derive(Clone)]
pub struct BoundedBuffer {
    inner: Arc<Inner>,
}

impl BoundedBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Blocks until there is room, then pushes `item`.
    pub fn add(&self, item: StreamItem) {
        let mut queue = self.inner.queue.lock();
        while queue.len() >= self.inner.capacity {
            self.inner.not_full.wait(&mut queue);
        }
        queue.push_back(item);
        self.inner.not_empty.notify_one();
    }

    /// Blocks until an item is available, then pops and returns it.
    pub fn get(&self) -> StreamItem {
        let mut queue = self.inner.queue.lock();
        while queue.is_empty() {
            self.inner.not_empty.wait(&mut queue);
        }
        let item = queue.pop_front().expect("queue checked non-empty above");
        self.inner.not_full.notify_one();
        item
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn get_blocks_until_an_item_is_added() {
        let buffer = BoundedBuffer::new(2);
        let producer = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.add(StreamItem::Row(Tuple::new().with("n", Value::Integer(1))));
        });

        let item = buffer.get();
        assert_eq!(item, StreamItem::Row(Tuple::new().with("n", Value::Integer(1))));
        handle.join().unwrap();
    }

    #[test]
    fn add_blocks_once_capacity_is_reached() {
        let buffer = BoundedBuffer::new(1);
        buffer.add(StreamItem::Row(Tuple::new()));

        let producer = buffer.clone();
        let handle = thread::spawn(move || {
            producer.add(StreamItem::End);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.get(), StreamItem::Row(Tuple::new()));
        assert_eq!(buffer.get(), StreamItem::End);
        handle.join().unwrap();
    }

    #[test]
    fn end_sentinel_flows_through_like_any_other_item() {
        let buffer = BoundedBuffer::new(4);
        buffer.add(StreamItem::Row(Tuple::new()));
        buffer.add(StreamItem::End);
        assert!(matches!(buffer.get(), StreamItem::Row(_)));
        assert_eq!(buffer.get(), StreamItem::End);
    }
}
