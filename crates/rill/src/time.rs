//! Sleep and timeout built on the runtime's timer driver.

use crate::error::{Error, Result};
use crate::runtime::timer::{TimerEntry, TimerShared};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Cloneable handle to the runtime's timer driver.
///
/// Obtained from [`Cx::timer`](crate::cx::Cx::timer); timed stream
/// operators (`debounce`) hold one so they can arm windows themselves.
#[derive(Clone)]
pub struct Timer {
    shared: Arc<TimerShared>,
}

impl Timer {
    pub(crate) fn new(shared: Arc<TimerShared>) -> Self {
        Self { shared }
    }

    /// A future that resolves `duration` from now.
    #[must_use]
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep {
            shared: self.shared.clone(),
            deadline: Instant::now() + duration,
            entry: None,
        }
    }
}

/// Future returned by [`Timer::sleep`].
///
/// Registers with the timer driver lazily on first poll, so constructing a
/// `Sleep` has no effect until it is awaited.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Sleep {
    shared: Arc<TimerShared>,
    deadline: Instant,
    entry: Option<Arc<TimerEntry>>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.entry.is_none() && Instant::now() >= this.deadline {
            return Poll::Ready(());
        }
        let entry = this
            .entry
            .get_or_insert_with(|| this.shared.register(this.deadline));
        if entry.has_fired() {
            Poll::Ready(())
        } else {
            entry.set_waker(cx.waker());
            Poll::Pending
        }
    }
}

/// Future returned by [`Cx::timeout`](crate::cx::Cx::timeout).
///
/// Races the wrapped future against a timer; whichever loses is dropped,
/// which is the cancellation path for a pull-driven future.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Timeout<F> {
    #[pin]
    future: F,
    sleep: Sleep,
    window: Duration,
}

impl<F> Timeout<F> {
    pub(crate) fn new(timer: Timer, window: Duration, future: F) -> Self {
        Self {
            future,
            sleep: timer.sleep(window),
            window,
        }
    }
}

impl<F, T> Future for Timeout<F>
where
    F: Future<Output = Result<T>>,
{
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(result) = this.future.poll(cx) {
            return Poll::Ready(result);
        }
        match Pin::new(this.sleep).poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(Error::Timeout {
                after: *this.window,
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::timer::TimerShared;
    use futures::executor::block_on;

    #[test]
    fn elapsed_deadline_is_ready_without_registering() {
        // No driver thread behind this shared state, so readiness can only
        // come from the fast path.
        let timer = Timer::new(TimerShared::new());
        block_on(timer.sleep(Duration::ZERO));
    }

    #[test]
    fn timeout_prefers_the_ready_future() {
        let timer = Timer::new(TimerShared::new());
        let out = block_on(Timeout::new(
            timer,
            Duration::ZERO,
            std::future::ready(Ok(3)),
        ));
        // The wrapped future wins the race when both are ready.
        assert_eq!(out, Ok(3));
    }
}
