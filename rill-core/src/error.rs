//! Error types for Rill.
//!
//! Two kinds of failure exist in the engine and they never mix:
//!
//! - [`SignalError`] is the payload of a signal's `error` event. It travels
//!   through the subscriber contract as a terminal event and is never returned
//!   from `subscribe`.
//! - [`Error`] is returned by the handful of fallible API calls, such as
//!   starting a scheduler thread.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The error carried by a signal's terminal `error` event.
///
/// Errors are cloned when they fan out (replay subjects, late subscribers),
/// so wrapped source errors are stored behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum SignalError {
    #[error("{0}")]
    Message(Arc<str>),

    #[error(transparent)]
    Source(Arc<dyn std::error::Error + Send + Sync + 'static>),

    #[error("signal timed out after {0:?}")]
    Timeout(Duration),
}

impl SignalError {
    /// Create an error from a plain message.
    pub fn msg(message: impl Into<Arc<str>>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Arc::new(error))
    }

    /// Whether this error was produced by a `timeout` operator.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors returned by fallible engine APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn worker thread for scheduler `{name}`")]
    SpawnWorker {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build the timer runtime")]
    TimerRuntime(#[source] std::io::Error),
}

/// Result alias for fallible engine APIs.
pub type Result<T> = std::result::Result<T, Error>;
