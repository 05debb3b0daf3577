// SPDX-License-Identifier: GPL-3.0-only

//! Keep-only-latest hand-off between a producer thread and one consumer task
//!
//! The producer never blocks: publishing replaces whatever item is still
//! waiting, and the replaced item is dropped (for frames, that releases the
//! buffer back to the pipeline). The consumer awaits the newest item.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

struct SlotState<T> {
    item: Option<T>,
    closed: bool,
    published: u64,
    dropped: u64,
}

/// Single-item mailbox with "keep only latest" backpressure
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    notify: Notify,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                item: None,
                closed: false,
                published: 0,
                dropped: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish an item, replacing any unconsumed one
    ///
    /// Returns `false` when the slot is closed; the item is dropped.
    pub fn publish(&self, item: T) -> bool {
        let stale = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.published += 1;
            let stale = state.item.replace(item);
            if stale.is_some() {
                state.dropped += 1;
            }
            stale
        };
        // Drop the replaced item outside the lock, its release hook may be slow
        drop(stale);
        self.notify.notify_one();
        true
    }

    /// Take the pending item without waiting
    pub fn try_take(&self) -> Option<T> {
        self.lock().item.take()
    }

    /// Wait for the next item; `None` once the slot is closed
    pub async fn next(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(item) = state.item.take() {
                    return Some(item);
                }
            }
            notified.await;
        }
    }

    /// Stop accepting items and wake the consumer; a pending item is dropped
    pub fn close(&self) {
        let pending = {
            let mut state = self.lock();
            state.closed = true;
            state.item.take()
        };
        drop(pending);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// (published, dropped before consumption)
    pub fn stats(&self) -> (u64, u64) {
        let state = self.lock();
        (state.published, state.dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_publish_replaces_pending() {
        let slot = LatestSlot::new();
        assert!(slot.publish(1));
        assert!(slot.publish(2));
        assert!(slot.publish(3));
        assert_eq!(slot.try_take(), Some(3));
        assert_eq!(slot.try_take(), None);
        assert_eq!(slot.stats(), (3, 2));
    }

    #[test]
    fn test_replaced_frame_is_released() {
        use crate::backends::camera::{Frame, PixelFormat};
        use std::sync::atomic::{AtomicUsize, Ordering};

        let counted = |released: &Arc<AtomicUsize>, sequence| {
            let released = released.clone();
            Frame::packed(4, 4, PixelFormat::Gray8, vec![0u8; 16])
                .with_sequence(sequence)
                .on_release(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                })
        };
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let slot = LatestSlot::new();
        assert!(slot.publish(counted(&first, 1)));
        assert!(slot.publish(counted(&second, 2)));

        // The stale frame went back before anyone took from the slot
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        let newest = slot.try_take().unwrap();
        assert_eq!(newest.sequence, 2);
        newest.close();
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(slot.stats(), (2, 1));
    }

    #[test]
    fn test_closed_slot_rejects() {
        let slot = LatestSlot::new();
        slot.publish("a");
        slot.close();
        assert!(slot.is_closed());
        assert!(!slot.publish("b"));
        assert_eq!(slot.try_take(), None);
    }

    #[tokio::test]
    async fn test_next_waits_for_publish() {
        let slot = Arc::new(LatestSlot::new());
        let producer = slot.clone();
        let handle = tokio::spawn(async move { producer.publish(42u32) });

        assert_eq!(slot.next().await, Some(42));
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_close_wakes_consumer() {
        let slot: Arc<LatestSlot<u32>> = Arc::new(LatestSlot::new());
        let consumer = slot.clone();
        let handle = tokio::spawn(async move { consumer.next().await });

        tokio::task::yield_now().await;
        slot.close();
        assert_eq!(handle.await.unwrap(), None);
    }
}
