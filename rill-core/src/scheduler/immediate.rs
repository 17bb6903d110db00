//! Immediate scheduler: runs work synchronously on the calling thread.

use std::thread;
use std::time::Duration;

use super::{Action, Scheduler, SchedulerId};
use crate::disposable::Disposable;

/// Runs scheduled work synchronously.
///
/// `schedule_after` blocks the calling thread for the delay. The immediate
/// scheduler never becomes the current scheduler: it has no execution context
/// of its own, so work it runs keeps whatever context the caller had.
#[derive(Debug)]
pub struct ImmediateScheduler {
    id: SchedulerId,
}

impl ImmediateScheduler {
    /// Create a new immediate scheduler.
    ///
    /// Most code should use the shared [`immediate`](super::immediate) instance.
    pub fn new() -> Self {
        Self {
            id: SchedulerId::new(),
        }
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ImmediateScheduler {
    fn id(&self) -> SchedulerId {
        self.id
    }

    fn name(&self) -> &str {
        "rill.immediate"
    }

    fn schedule(&self, action: Action) -> Disposable {
        action();
        Disposable::empty()
    }

    fn schedule_after(&self, delay: Duration, action: Action) -> Disposable {
        thread::sleep(delay);
        action();
        Disposable::empty()
    }
}
