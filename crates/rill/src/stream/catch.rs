//! Catch combinator.

use super::Stream;
use crate::error::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};

enum CatchState<S, R, F> {
    Upstream { stream: S, handler: F },
    Replacement(R),
    Done,
}

/// Stream for the [`catch`](super::StreamExt::catch) method.
///
/// Intercepts the first failure item from upstream and hands it to the
/// handler, whose replacement stream is spliced in before completion.
/// Cancellation is not intercepted, and failures raised by operators
/// downstream of the `catch` never pass through it.
#[must_use = "streams do nothing unless polled"]
pub struct Catch<S, R, F> {
    state: CatchState<S, R, F>,
}

impl<S, R, F> Catch<S, R, F> {
    pub(crate) fn new(stream: S, handler: F) -> Self {
        Self {
            state: CatchState::Upstream { stream, handler },
        }
    }
}

impl<S, R, F, T> Stream for Catch<S, R, F>
where
    S: Stream<Item = Result<T>> + Unpin,
    R: Stream<Item = Result<T>> + Unpin,
    F: FnOnce(Error) -> R + Unpin,
{
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match &mut this.state {
                CatchState::Upstream { stream, .. } => {
                    match Pin::new(stream).poll_next(cx) {
                        Poll::Ready(Some(Err(error))) => {
                            if error.is_cancelled() {
                                this.state = CatchState::Done;
                                return Poll::Ready(Some(Err(error)));
                            }
                            let CatchState::Upstream { handler, .. } =
                                std::mem::replace(&mut this.state, CatchState::Done)
                            else {
                                unreachable!("state matched above");
                            };
                            this.state = CatchState::Replacement(handler(error));
                        }
                        Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(Ok(item))),
                        Poll::Ready(None) => {
                            this.state = CatchState::Done;
                            return Poll::Ready(None);
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                CatchState::Replacement(replacement) => {
                    match Pin::new(replacement).poll_next(cx) {
                        Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                        Poll::Ready(None) => {
                            this.state = CatchState::Done;
                            return Poll::Ready(None);
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                CatchState::Done => return Poll::Ready(None),
            }
        }
    }
}
