//! Cooperative cancellation token.
//!
//! Every task carries a [`CancelToken`]. Requesting cancellation flips the
//! token immediately and wakes every registered waiter; the affected task
//! observes the flag at its next suspension point. Once set, the flag never
//! reverts.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

/// A cloneable handle observing (and requesting) cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent; returns `true` only for the call
    /// that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        if first {
            let wakers = std::mem::take(&mut *self.inner.wakers.lock());
            for waker in wakers {
                waker.wake();
            }
        }
        first
    }

    /// Whether cancellation has been requested. Stable once `true`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Registers a waker to be woken when the token flips.
    ///
    /// If the token is already cancelled the waker is woken immediately.
    pub fn register(&self, waker: &Waker) {
        if self.is_cancelled() {
            waker.wake_by_ref();
            return;
        }
        let mut wakers = self.inner.wakers.lock();
        // Re-check under the lock so a concurrent cancel cannot slip between
        // the flag read and the push.
        if self.inner.cancelled.load(Ordering::Acquire) {
            drop(wakers);
            waker.wake_by_ref();
            return;
        }
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    /// A future that resolves once cancellation has been requested.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            token: self.clone(),
        }
    }
}

/// Future returned by [`CancelToken::cancelled`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Cancelled {
    token: CancelToken,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.token.is_cancelled() {
            Poll::Ready(())
        } else {
            self.token.register(cx.waker());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn registered_waker_fires_on_cancel() {
        use std::sync::atomic::AtomicUsize;
        use std::task::Wake;

        struct Counter(AtomicUsize);
        impl Wake for Counter {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let token = CancelToken::new();
        token.register(&waker);
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        // Registering after cancellation wakes immediately.
        token.register(&waker);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
