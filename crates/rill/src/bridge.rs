//! Adapters from callback-style APIs to streams and single futures.
//!
//! External sources that push values through a registered callback are
//! wired in with [`bridge_callback`] (many values, a stream) or
//! [`bridge_once`] (one value, a future). In both shapes the unregister
//! hook runs exactly once when consumption ends, whether that is normal
//! completion, abandonment, or task cancellation; an emission racing with
//! unregister-initiation is dropped, never delivered.

use crate::error::{Error, Result};
use crate::stream::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

struct BridgeInner<T> {
    queue: VecDeque<T>,
    waker: Option<Waker>,
    /// Set by the consumer side before unregister runs; emissions
    /// observing it are dropped under the same lock.
    closed: bool,
    /// Set by the source via [`Emitter::close`].
    finished: bool,
}

struct BridgeShared<T> {
    inner: Mutex<BridgeInner<T>>,
}

impl<T> BridgeShared<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(BridgeInner {
                queue: VecDeque::new(),
                waker: None,
                closed: false,
                finished: false,
            }),
        })
    }
}

/// Push-side handle handed to the external `register` hook.
pub struct Emitter<T> {
    shared: Arc<BridgeShared<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Emitter<T> {
    /// Pushes one value toward the consumer.
    ///
    /// Returns `false` if the bridge is already closed (the value is
    /// dropped, not delivered).
    pub fn emit(&self, value: T) -> bool {
        let waker = {
            let mut inner = self.shared.inner.lock();
            if inner.closed || inner.finished {
                return false;
            }
            inner.queue.push_back(value);
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Signals that the source will emit nothing further.
    pub fn close(&self) {
        let waker = {
            let mut inner = self.shared.inner.lock();
            inner.finished = true;
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Adapts a callback-registration API into a stream.
///
/// `register` runs on the first poll and receives the [`Emitter`];
/// `unregister` runs exactly once when the stream is dropped (collection
/// finished, abandoned, or the consuming task cancelled). If the stream is
/// never polled, `register` never runs and neither does `unregister`.
pub fn bridge_callback<T, R, U>(register: R, unregister: U) -> CallbackStream<T, R, U>
where
    R: FnOnce(Emitter<T>),
    U: FnOnce(),
{
    CallbackStream {
        shared: BridgeShared::new(),
        register: Some(register),
        unregister: Some(unregister),
        registered: false,
    }
}

/// Stream for the [`bridge_callback`] function.
#[must_use = "streams do nothing unless polled"]
pub struct CallbackStream<T, R, U>
where
    U: FnOnce(),
{
    shared: Arc<BridgeShared<T>>,
    register: Option<R>,
    unregister: Option<U>,
    registered: bool,
}

impl<T, R, U> CallbackStream<T, R, U>
where
    U: FnOnce(),
{
    /// Closes the bridge; runs `unregister` once if `register` ever ran.
    fn shut_down(&mut self) {
        self.shared.inner.lock().closed = true;
        if self.registered
            && let Some(unregister) = self.unregister.take()
        {
            unregister();
        }
    }
}

impl<T, R, U> Stream for CallbackStream<T, R, U>
where
    R: FnOnce(Emitter<T>) + Unpin,
    U: FnOnce() + Unpin,
    T: Unpin,
{
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if let Some(register) = this.register.take() {
            this.registered = true;
            register(Emitter {
                shared: this.shared.clone(),
            });
        }
        let poll = {
            let mut inner = this.shared.inner.lock();
            if let Some(value) = inner.queue.pop_front() {
                Poll::Ready(Some(value))
            } else if inner.finished || inner.closed {
                Poll::Ready(None)
            } else {
                match inner.waker.as_ref() {
                    Some(existing) if existing.will_wake(cx.waker()) => {}
                    _ => inner.waker = Some(cx.waker().clone()),
                }
                Poll::Pending
            }
        };
        if matches!(poll, Poll::Ready(None)) {
            this.shut_down();
        }
        poll
    }
}

impl<T, R, U> Drop for CallbackStream<T, R, U>
where
    U: FnOnce(),
{
    fn drop(&mut self) {
        self.shut_down();
    }
}

/// Adapts a callback-registration API into a single-resolution future.
///
/// The first emission resolves the future; later emissions are dropped.
/// The unregister guarantee matches [`bridge_callback`]. Resolves to
/// [`Error::Upstream`] if the source closes without emitting.
pub fn bridge_once<T, R, U>(register: R, unregister: U) -> CallbackOnce<T, R, U>
where
    R: FnOnce(Emitter<T>),
    U: FnOnce(),
{
    CallbackOnce {
        inner: bridge_callback(register, unregister),
    }
}

/// Future for the [`bridge_once`] function.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct CallbackOnce<T, R, U>
where
    U: FnOnce(),
{
    inner: CallbackStream<T, R, U>,
}

impl<T, R, U> Future for CallbackOnce<T, R, U>
where
    R: FnOnce(Emitter<T>) + Unpin,
    U: FnOnce() + Unpin,
    T: Unpin,
{
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(value)) => {
                self.inner.shut_down();
                Poll::Ready(Ok(value))
            }
            Poll::Ready(None) => Poll::Ready(Err(Error::upstream(
                "callback source closed without a value",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamExt;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn registers_on_first_poll_and_unregisters_once() {
        let registered = Rc::new(Cell::new(0));
        let unregistered = Rc::new(Cell::new(0));
        let stream = bridge_callback(
            {
                let registered = registered.clone();
                move |emitter: Emitter<i32>| {
                    registered.set(registered.get() + 1);
                    emitter.emit(1);
                    emitter.emit(2);
                    emitter.close();
                }
            },
            {
                let unregistered = unregistered.clone();
                move || unregistered.set(unregistered.get() + 1)
            },
        );
        let out = block_on(stream.collect());
        assert_eq!(out, vec![1, 2]);
        assert_eq!(registered.get(), 1);
        assert_eq!(unregistered.get(), 1);
    }

    #[test]
    fn abandoning_the_stream_unregisters_once() {
        let unregistered = Rc::new(Cell::new(0));
        let mut stream = bridge_callback(
            |emitter: Emitter<i32>| {
                emitter.emit(7);
            },
            {
                let unregistered = unregistered.clone();
                move || unregistered.set(unregistered.get() + 1)
            },
        );
        assert_eq!(block_on(stream.next()), Some(7));
        drop(stream);
        assert_eq!(unregistered.get(), 1);
    }

    #[test]
    fn never_polled_never_registers_or_unregisters() {
        let unregistered = Rc::new(Cell::new(0));
        let stream = bridge_callback(
            |_emitter: Emitter<i32>| panic!("register must not run"),
            {
                let unregistered = unregistered.clone();
                move || unregistered.set(unregistered.get() + 1)
            },
        );
        drop(stream);
        assert_eq!(unregistered.get(), 0);
    }

    #[test]
    fn emission_after_close_is_dropped() {
        let emitter_slot: Rc<Cell<Option<Emitter<i32>>>> = Rc::new(Cell::new(None));
        let mut stream = bridge_callback(
            {
                let slot = emitter_slot.clone();
                move |emitter: Emitter<i32>| {
                    emitter.emit(1);
                    slot.set(Some(emitter));
                }
            },
            || {},
        );
        assert_eq!(block_on(stream.next()), Some(1));
        drop(stream);
        let emitter = emitter_slot.take().unwrap();
        assert!(!emitter.emit(2));
    }

    #[test]
    fn once_resolves_with_first_value() {
        let unregistered = Rc::new(Cell::new(0));
        let future = bridge_once(
            |emitter: Emitter<i32>| {
                emitter.emit(42);
                emitter.emit(43);
            },
            {
                let unregistered = unregistered.clone();
                move || unregistered.set(unregistered.get() + 1)
            },
        );
        assert_eq!(block_on(future), Ok(42));
        assert_eq!(unregistered.get(), 1);
    }

    #[test]
    fn once_fails_when_source_closes_empty() {
        let out = block_on(bridge_once(
            |emitter: Emitter<i32>| emitter.close(),
            || {},
        ));
        assert!(matches!(out, Err(Error::Upstream { .. })));
    }
}
