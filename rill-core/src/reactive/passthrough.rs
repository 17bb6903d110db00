//! Passthrough subscriber: the gate between a producer and its subscriber.

use std::sync::Arc;

use tracing::trace;

use super::{SharedSubscriber, Subscriber};
use crate::disposable::CompoundDisposable;
use crate::error::SignalError;

/// Forwards events to a subscriber for as long as one subscription lives.
///
/// Every subscription wraps the caller's subscriber in one of these. Once the
/// subscription's disposable is disposed, events are dropped here, so the
/// caller never hears from a subscription it already cancelled.
pub struct PassthroughSubscriber<T> {
    inner: SharedSubscriber<T>,
    disposable: CompoundDisposable,
    name: Option<Arc<str>>,
}

impl<T> PassthroughSubscriber<T> {
    /// Wrap `inner` for the subscription tracked by `disposable`.
    ///
    /// `inner` is told about the subscription right away.
    pub fn new(inner: SharedSubscriber<T>, disposable: CompoundDisposable, name: Option<Arc<str>>) -> Self {
        inner.did_subscribe_with(&disposable);
        Self {
            inner,
            disposable,
            name,
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

impl<T> Subscriber<T> for PassthroughSubscriber<T> {
    fn send_next(&self, value: T) {
        if self.disposable.is_disposed() {
            return;
        }
        self.inner.send_next(value);
    }

    fn send_error(&self, error: SignalError) {
        if self.disposable.is_disposed() {
            return;
        }
        trace!(signal = self.name(), %error, "error");
        self.inner.send_error(error);
    }

    fn send_completed(&self) {
        if self.disposable.is_disposed() {
            return;
        }
        trace!(signal = self.name(), "completed");
        self.inner.send_completed();
    }

    fn did_subscribe_with(&self, disposable: &CompoundDisposable) {
        if disposable.as_disposable().ptr_eq(self.disposable.as_disposable()) {
            return;
        }
        self.inner.did_subscribe_with(disposable);
    }

    fn is_disposed(&self) -> bool {
        self.disposable.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::FnSubscriber;
    use parking_lot::Mutex;

    #[test]
    fn stops_forwarding_once_disposed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let target: SharedSubscriber<i32> = Arc::new(FnSubscriber::new(
            move |value| seen_clone.lock().push(value),
            |_| {},
            || {},
        ));

        let subscription = CompoundDisposable::new();
        let passthrough = PassthroughSubscriber::new(target, subscription.clone(), None);

        passthrough.send_next(1);
        subscription.dispose();
        passthrough.send_next(2);

        assert_eq!(*seen.lock(), vec![1]);
        assert!(passthrough.is_disposed());
    }

    #[test]
    fn target_learns_about_subscription() {
        let target = Arc::new(FnSubscriber::<i32>::new(|_| {}, |_| {}, || {}));
        let subscription = CompoundDisposable::new();
        let passthrough =
            PassthroughSubscriber::<i32>::new(target.clone(), subscription.clone(), Some("numbers".into()));

        passthrough.send_completed();

        assert!(target.is_disposed());
        assert!(subscription.is_disposed());
    }
}
