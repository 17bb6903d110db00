//! Serial disposables: a single, replaceable child.

use std::fmt::Debug;

use super::{Disposable, DisposableId, Payload};

/// A disposable holding at most one child that can be swapped out.
///
/// Useful when the disposable for some work only becomes known after the
/// work started, or when one piece of work replaces another (recursive
/// scheduling, `catch`).
#[derive(Clone)]
pub struct SerialDisposable(Disposable);

impl SerialDisposable {
    /// Create an empty serial disposable.
    pub fn new() -> Self {
        Self(Disposable::with_payload(Payload::Serial(None)))
    }

    /// Get the serial disposable's unique ID.
    pub fn id(&self) -> DisposableId {
        self.0.id()
    }

    /// Whether the serial disposable has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.0.is_disposed()
    }

    /// Dispose the receiver and its current child.
    pub fn dispose(&self) {
        self.0.dispose();
    }

    /// Replace the current child, returning the previous one undisposed.
    ///
    /// If the receiver is already disposed, `child` is disposed immediately
    /// and `None` is returned.
    pub fn set(&self, child: impl Into<Disposable>) -> Option<Disposable> {
        let child = child.into();
        let swapped = self.0.with_active_payload(|payload| match payload {
            Payload::Serial(slot) => Ok(slot.replace(child.clone())),
            _ => Err(()),
        });

        match swapped {
            Some(Ok(previous)) => previous,
            _ => {
                child.dispose();
                None
            }
        }
    }

    /// The current child, if any.
    pub fn get(&self) -> Option<Disposable> {
        self.0
            .with_active_payload(|payload| match payload {
                Payload::Serial(slot) => slot.clone(),
                _ => None,
            })
            .flatten()
    }
}

impl Default for SerialDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SerialDisposable> for Disposable {
    fn from(serial: SerialDisposable) -> Self {
        serial.0
    }
}

impl Debug for SerialDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDisposable")
            .field("id", &self.id().raw())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
