//! Hot relays: producers that run independently of consumer attachment.
//!
//! Two flavours with different caching policies:
//!
//! - [`StateRelay`]: latest-value cache, adjacent duplicates suppressed at
//!   the producer. Every attach starts with the current value.
//! - [`BroadcastRelay`]: no duplicate suppression, bounded replay buffer
//!   (default 0). A late attacher sees at most the buffered tail.
//!
//! Relays are the only engine structures mutated concurrently from several
//! attach points, so all mutation (`set`/`emit`) is serialized behind one
//! mutex while each consumer drains its own unbounded queue; a slow
//! consumer never blocks the producer or its peers.

mod broadcast;
mod state;

pub use broadcast::{BroadcastRelay, BroadcastView};
pub use state::{StateRelay, StateView};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

/// Per-consumer mailbox: an unbounded queue plus the consumer's waker.
pub(crate) struct ViewShared<T> {
    inner: Mutex<ViewInner<T>>,
}

struct ViewInner<T> {
    queue: VecDeque<T>,
    waker: Option<Waker>,
    closed: bool,
}

impl<T> ViewShared<T> {
    fn new(seed: impl IntoIterator<Item = T>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ViewInner {
                queue: seed.into_iter().collect(),
                waker: None,
                closed: false,
            }),
        })
    }

    /// Enqueues one value; returns the waker to fire, if any.
    fn push(&self, value: T) -> Option<Waker> {
        let mut inner = self.inner.lock();
        inner.queue.push_back(value);
        inner.waker.take()
    }

    /// Marks the producer gone; returns the waker to fire, if any.
    fn close(&self) -> Option<Waker> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.waker.take()
    }

    /// Stream-style poll over the mailbox.
    fn poll_pop(&self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut inner = self.inner.lock();
        if let Some(value) = inner.queue.pop_front() {
            return Poll::Ready(Some(value));
        }
        if inner.closed {
            return Poll::Ready(None);
        }
        match inner.waker.as_ref() {
            Some(existing) if existing.will_wake(cx.waker()) => {}
            _ => inner.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

/// Fans `value` out to every live consumer, pruning dropped ones.
///
/// Wakers are collected under the registry lock but fired by the caller
/// after it releases the relay mutex.
pub(crate) fn fan_out<T: Clone>(
    consumers: &mut Vec<Weak<ViewShared<T>>>,
    value: &T,
    wakers: &mut Vec<Waker>,
) {
    consumers.retain(|weak| match weak.upgrade() {
        Some(view) => {
            if let Some(waker) = view.push(value.clone()) {
                wakers.push(waker);
            }
            true
        }
        None => false,
    });
}

/// Closes every live consumer mailbox.
pub(crate) fn close_all<T>(consumers: &mut Vec<Weak<ViewShared<T>>>, wakers: &mut Vec<Waker>) {
    for weak in consumers.drain(..) {
        if let Some(view) = weak.upgrade()
            && let Some(waker) = view.close()
        {
            wakers.push(waker);
        }
    }
}
