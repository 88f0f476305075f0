//! Fan-out relay with a bounded replay buffer.

use super::{ViewShared, close_all, fan_out};
use crate::stream::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

struct BroadcastInner<T> {
    replay: VecDeque<T>,
    capacity: usize,
    consumers: Vec<Weak<ViewShared<T>>>,
}

struct BroadcastShared<T> {
    inner: Mutex<BroadcastInner<T>>,
}

struct ProducerGuard<T> {
    shared: Arc<BroadcastShared<T>>,
}

impl<T> Drop for ProducerGuard<T> {
    fn drop(&mut self) {
        let mut wakers = Vec::new();
        close_all(&mut self.shared.inner.lock().consumers, &mut wakers);
        for waker in wakers {
            waker.wake();
        }
    }
}

/// A hot relay that never suppresses duplicates.
///
/// Every [`emit`](BroadcastRelay::emit) is delivered to each attached view
/// and appended to a replay ring of at most `replay` entries (default 0).
/// A consumer attaching after the ring has wrapped misses the overwritten
/// entries; with a capacity of 0 a late attacher receives nothing
/// retroactively. Cloning the relay clones the producer handle; when the
/// last one drops, views complete after draining their queues.
#[derive(Clone)]
pub struct BroadcastRelay<T> {
    shared: Arc<BroadcastShared<T>>,
    _guard: Arc<ProducerGuard<T>>,
}

impl<T: Clone + Send> BroadcastRelay<T> {
    /// Creates a relay with a replay buffer of `replay` entries.
    #[must_use]
    pub fn new(replay: usize) -> Self {
        let shared = Arc::new(BroadcastShared {
            inner: Mutex::new(BroadcastInner {
                replay: VecDeque::with_capacity(replay),
                capacity: replay,
                consumers: Vec::new(),
            }),
        });
        Self {
            _guard: Arc::new(ProducerGuard {
                shared: shared.clone(),
            }),
            shared,
        }
    }

    /// Delivers `value` to every live view and records it in the replay
    /// ring. Never blocks on slow consumers.
    pub fn emit(&self, value: T) {
        let mut wakers = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.capacity > 0 {
                if inner.replay.len() == inner.capacity {
                    inner.replay.pop_front();
                }
                inner.replay.push_back(value.clone());
            }
            fan_out(&mut inner.consumers, &value, &mut wakers);
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Attaches a consumer.
    ///
    /// The view first receives up to `replay` most recent buffered values,
    /// then live emissions.
    #[must_use]
    pub fn attach(&self) -> BroadcastView<T> {
        let mut inner = self.shared.inner.lock();
        let seed: Vec<T> = inner.replay.iter().cloned().collect();
        let view = ViewShared::new(seed);
        inner.consumers.push(Arc::downgrade(&view));
        BroadcastView { shared: view }
    }
}

impl<T: Clone + Send> Default for BroadcastRelay<T> {
    /// Equivalent to [`BroadcastRelay::new`]`(0)`: no replay, so a late
    /// attacher receives nothing retroactively.
    fn default() -> Self {
        Self::new(0)
    }
}

/// Stream of values observed by one consumer of a [`BroadcastRelay`].
#[must_use = "streams do nothing unless polled"]
pub struct BroadcastView<T> {
    shared: Arc<ViewShared<T>>,
}

impl<T> Stream for BroadcastView<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.shared.poll_pop(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamExt;
    use futures::executor::block_on;

    #[test]
    fn live_consumer_sees_every_emission_including_duplicates() {
        let relay = BroadcastRelay::new(0);
        let view = relay.attach();
        for v in [1, 2, 2, 1, 3] {
            relay.emit(v);
        }
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![1, 2, 2, 1, 3]);
    }

    #[test]
    fn no_replay_means_late_consumer_sees_nothing_past() {
        let relay = BroadcastRelay::new(0);
        relay.emit(1);
        relay.emit(2);
        let view = relay.attach();
        relay.emit(3);
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![3]);
    }

    #[test]
    fn no_replay_and_no_live_overlap_means_empty() {
        let relay = BroadcastRelay::new(0);
        for v in [1, 2, 2, 1, 3] {
            relay.emit(v);
        }
        let view = relay.attach();
        drop(relay);
        assert_eq!(block_on(view.collect()), Vec::<i32>::new());
    }

    #[test]
    fn replay_buffer_rewinds_late_consumers() {
        let relay = BroadcastRelay::new(2);
        for v in [1, 2, 3, 4] {
            relay.emit(v);
        }
        let view = relay.attach();
        relay.emit(5);
        drop(relay);
        // Last two retained emissions, then the live one.
        assert_eq!(block_on(view.collect()), vec![3, 4, 5]);
    }

    #[test]
    fn replay_shorter_than_history_keeps_newest() {
        let relay = BroadcastRelay::new(3);
        relay.emit(7);
        let view = relay.attach();
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![7]);
    }

    #[test]
    fn default_relay_keeps_no_replay() {
        let relay = BroadcastRelay::default();
        relay.emit(1);
        let view = relay.attach();
        relay.emit(2);
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![2]);
    }

    #[test]
    fn consumers_drain_independently() {
        let relay = BroadcastRelay::new(0);
        let a = relay.attach();
        let b = relay.attach();
        relay.emit(1);
        relay.emit(2);
        drop(relay);
        assert_eq!(block_on(a.collect()), vec![1, 2]);
        assert_eq!(block_on(b.collect()), vec![1, 2]);
    }
}
