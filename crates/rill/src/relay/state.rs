//! Latest-value relay with duplicate suppression.

use super::{ViewShared, close_all, fan_out};
use crate::stream::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

struct StateInner<T> {
    current: T,
    consumers: Vec<Weak<ViewShared<T>>>,
}

struct StateShared<T> {
    inner: Mutex<StateInner<T>>,
}

/// Drops with the last producer handle and closes every attached view.
struct ProducerGuard<T> {
    shared: Arc<StateShared<T>>,
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

/// A hot relay caching exactly one logical "current value".
///
/// [`set`](StateRelay::set) with a value equal to the cache is a no-op, so
/// consumers never observe adjacent duplicates; a consumer attaching at
/// any point first sees the latest value, never history. Cloning the relay
/// clones the producer handle; when the last
/// producer handle drops, every view completes after draining its queue.
#[derive(Clone)]
pub struct StateRelay<T> {
    shared: Arc<StateShared<T>>,
    _guard: Arc<ProducerGuard<T>>,
}

impl<T: Clone + PartialEq + Send> StateRelay<T> {
    /// Creates a relay seeded with `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        let shared = Arc::new(StateShared {
            inner: Mutex::new(StateInner {
                current: initial,
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

    /// Replaces the cached value and fans it out to every attached view.
    ///
    /// Setting a value equal to the current cache does nothing: no
    /// emission, cache unchanged. Never blocks on slow consumers.
    pub fn set(&self, value: T) {
        let mut wakers = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.current == value {
                return;
            }
            inner.current = value.clone();
            fan_out(&mut inner.consumers, &value, &mut wakers);
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// A copy of the cached value.
    #[must_use]
    pub fn get(&self) -> T {
        self.shared.inner.lock().current.clone()
    }

    /// Attaches a consumer.
    ///
    /// The view is a cold window onto the hot relay: it immediately yields
    /// the cached value, then each subsequent distinct value, each
    /// consumer tracking its own read cursor.
    #[must_use]
    pub fn attach(&self) -> StateView<T> {
        let mut inner = self.shared.inner.lock();
        let view = ViewShared::new([inner.current.clone()]);
        inner.consumers.push(Arc::downgrade(&view));
        StateView { shared: view }
    }
}

/// Stream of values observed by one consumer of a [`StateRelay`].
#[must_use = "streams do nothing unless polled"]
pub struct StateView<T> {
    shared: Arc<ViewShared<T>>,
}

impl<T> Stream for StateView<T> {
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
    fn consumer_sees_seed_then_distinct_values() {
        let relay = StateRelay::new(0);
        let view = relay.attach();
        relay.set(1);
        relay.set(2);
        relay.set(2);
        relay.set(1);
        relay.set(3);
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![0, 1, 2, 1, 3]);
    }

    #[test]
    fn late_consumer_sees_only_current_value_onward() {
        let relay = StateRelay::new(0);
        relay.set(1);
        relay.set(2);
        let view = relay.attach();
        relay.set(3);
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![2, 3]);
    }

    #[test]
    fn set_equal_value_keeps_cache_and_emits_nothing() {
        let relay = StateRelay::new(5);
        relay.set(5);
        assert_eq!(relay.get(), 5);
        let view = relay.attach();
        relay.set(5);
        drop(relay);
        assert_eq!(block_on(view.collect()), vec![5]);
    }

    #[test]
    fn consumers_track_independent_cursors() {
        let relay = StateRelay::new(0);
        let fast = relay.attach();
        let slow = relay.attach();
        relay.set(1);
        relay.set(2);
        drop(relay);
        // Draining one view does not disturb the other.
        assert_eq!(block_on(fast.collect()), vec![0, 1, 2]);
        assert_eq!(block_on(slow.collect()), vec![0, 1, 2]);
    }

    #[test]
    fn cloned_producer_keeps_views_open() {
        let relay = StateRelay::new(0);
        let clone = relay.clone();
        let view = relay.attach();
        drop(relay);
        clone.set(9);
        drop(clone);
        assert_eq!(block_on(view.collect()), vec![0, 9]);
    }
}
