use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::debug;

/// Bounded single-producer/single-consumer handoff between pipeline
/// stages.
///
/// When full, a push evicts the oldest non-keyframe entry; keyframes are
/// never evicted. If every queued entry is a keyframe the push still
/// succeeds and the queue transiently exceeds its capacity, which stays
/// bounded in practice because keyframes are sparse.
pub struct FrameQueue<T> {
    inner: Mutex<VecDeque<(bool, T)>>,
    notify: Notify,
    capacity: usize,
}

impl<T> FrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue an item; returns true if an older entry was evicted.
    pub fn push(&self, keyframe: bool, item: T) -> bool {
        let mut queue = self.inner.lock().unwrap();
        let mut evicted = false;
        if queue.len() >= self.capacity {
            if let Some(at) = queue.iter().position(|(kf, _)| !*kf) {
                queue.remove(at);
                evicted = true;
                debug!("frame queue full, dropped an undelivered delta frame");
            }
        }
        queue.push_back((keyframe, item));
        drop(queue);
        self.notify.notify_one();
        evicted
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front().map(|(_, item)| item)
    }

    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let queue = FrameQueue::new(4);
        queue.push(false, 1);
        queue.push(false, 2);
        queue.push(true, 3);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn full_queue_drops_oldest_delta() {
        let queue = FrameQueue::new(2);
        queue.push(false, 1);
        queue.push(true, 2);
        assert!(queue.push(false, 3));
        // 1 was evicted; the keyframe survived.
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
    }

    #[test]
    fn keyframes_never_evicted() {
        let queue = FrameQueue::new(2);
        queue.push(true, 1);
        queue.push(true, 2);
        assert!(!queue.push(true, 3));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(1));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = std::sync::Arc::new(FrameQueue::new(2));
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::task::yield_now().await;
        queue.push(false, 42);
        assert_eq!(popper.await.unwrap(), 42);
    }
}
