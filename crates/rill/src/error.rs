//! Error taxonomy for the engine.
//!
//! Cancellation is deliberately modelled as an error variant rather than a
//! separate channel: it travels the same paths as real failures but is
//! treated as "not a true failure" by the recovery operators (`retry` and
//! `catch` pass it through untouched) and by the scope failure policies.

use std::sync::Arc;
use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The engine's error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The task or stream was cooperatively cancelled.
    #[error("cancelled")]
    Cancelled,

    /// A producer or operator body failed (including captured panics).
    #[error("upstream failure: {message}")]
    Upstream {
        /// Human-readable description of the failure.
        message: Arc<str>,
    },

    /// A terminal operator required at least one element and got none.
    #[error("empty sequence")]
    EmptySequence,

    /// A deadline elapsed before the raced operation finished.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The window that elapsed.
        after: Duration,
    },
}

impl Error {
    /// Builds an [`Error::Upstream`] from any displayable cause.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: Arc::from(message.into().into_boxed_str()),
        }
    }

    /// True for [`Error::Cancelled`].
    ///
    /// Recovery operators use this to let cancellation sail past them.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_carries_message() {
        let err = Error::upstream("boom");
        assert_eq!(err.to_string(), "upstream failure: boom");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_is_not_a_failure() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::EmptySequence.is_cancelled());
    }
}
