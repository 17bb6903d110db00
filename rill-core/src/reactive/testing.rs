//! Helpers shared by the unit tests of the reactive modules.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{FnSubscriber, SharedSubscriber, Signal, Value};
use crate::error::SignalError;
use crate::scheduler::{CurrentScheduler, VirtualScheduler};

/// How a subscription ended, if it did.
#[derive(Debug, Clone, Default)]
pub(crate) struct Outcome {
    completed: usize,
    errors: Vec<SignalError>,
}

impl Outcome {
    pub(crate) fn is_completed(&self) -> bool {
        self.completed == 1 && self.errors.is_empty()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.terminal_count() == 0
    }

    pub(crate) fn error(&self) -> Option<&SignalError> {
        match self.errors.as_slice() {
            [error] if self.completed == 0 => Some(error),
            _ => None,
        }
    }

    pub(crate) fn terminal_count(&self) -> usize {
        self.completed + self.errors.len()
    }
}

/// Records every event it receives.
pub(crate) struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
    outcome: Arc<Mutex<Outcome>>,
}

impl<T: Value> Recorder<T> {
    pub(crate) fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
            outcome: Arc::new(Mutex::new(Outcome::default())),
        }
    }

    pub(crate) fn subscriber(&self) -> SharedSubscriber<T> {
        let values = self.values.clone();
        let errors = self.outcome.clone();
        let completions = self.outcome.clone();
        Arc::new(FnSubscriber::new(
            move |value| values.lock().push(value),
            move |error| errors.lock().errors.push(error),
            move || completions.lock().completed += 1,
        ))
    }

    pub(crate) fn values(&self) -> Vec<T> {
        self.values.lock().clone()
    }

    pub(crate) fn outcome(&self) -> Outcome {
        self.outcome.lock().clone()
    }
}

/// Subscribe synchronously and gather everything sent during subscription.
pub(crate) fn collect<T: Value>(signal: &Signal<T>) -> (Vec<T>, Outcome) {
    let recorder = Recorder::new();
    CurrentScheduler::run_as(Arc::new(VirtualScheduler::new()), || {
        signal.subscribe(recorder.subscriber());
    });
    (recorder.values(), recorder.outcome())
}
