//! Eager and lazy start.
//!
//! Both helpers run a producer block once and share its events with every
//! subscriber through a [`ReplaySubject`].
//!
//! The production itself is never disposed. Disposing a subscription only
//! detaches that subscriber; the block keeps running and the subject keeps
//! its history for as long as the returned signal is alive. Use these for
//! work that should happen exactly once no matter who listens.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{FnSubscriber, ReplaySubject, SharedSubscriber, Signal, Value};
use crate::scheduler::SchedulerRef;

impl<T: Value> Signal<T> {
    /// Run `block` on `scheduler` the first time the signal is subscribed.
    ///
    /// `block` receives the subscriber to push its events into. Later
    /// subscribers share the same run and get its events replayed.
    pub fn start_lazily<F>(scheduler: SchedulerRef, block: F) -> Signal<T>
    where
        F: FnOnce(SharedSubscriber<T>) + Send + 'static,
    {
        let subject = ReplaySubject::new();
        let block = Mutex::new(Some(block));

        Signal::create(move |subscriber| {
            let subscription = subject.signal().subscribe(subscriber);

            let block = block.lock().take();
            if let Some(block) = block {
                trace!("starting shared production");
                let producer: SharedSubscriber<T> = Arc::new(subject.clone());
                block(producer);
            }

            Some(subscription)
        })
        .subscribe_on(scheduler)
    }

    /// Run `block` on `scheduler` right away, before anyone subscribes.
    ///
    /// Subscribers get every event the block sent, replayed, followed by
    /// whatever it sends next.
    pub fn start_eagerly<F>(scheduler: SchedulerRef, block: F) -> Signal<T>
    where
        F: FnOnce(SharedSubscriber<T>) + Send + 'static,
    {
        let signal = Self::start_lazily(scheduler, block);

        // Starts the production; the subscription is deliberately never
        // disposed.
        signal.subscribe(Arc::new(FnSubscriber::new(|_: T| {}, |_| {}, || {})));
        signal
    }
}
