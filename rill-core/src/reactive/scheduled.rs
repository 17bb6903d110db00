//! Scheduler-aware operators and error recovery.
//!
//! These sit on top of the primitives: they decide where subscription and
//! delivery happen, add time to a signal, or resubscribe after an error. None
//! of them change what a signal sends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{FnSubscriber, SharedSubscriber, Signal, Value};
use crate::disposable::{CompoundDisposable, SerialDisposable};
use crate::error::SignalError;
use crate::scheduler::{schedule_repeating, Action, SchedulerRef};

impl<T: Value> Signal<T> {
    /// Subscribe to the receiver on `scheduler`.
    ///
    /// Events are still sent from wherever the receiver sends them.
    pub fn subscribe_on(&self, scheduler: SchedulerRef) -> Signal<T> {
        let source = self.clone();
        Signal::create(move |subscriber| {
            let compound = CompoundDisposable::new();

            let source = source.clone();
            let subscription = compound.clone();
            let scheduled = scheduler.schedule(Box::new(move || {
                subscription.add(source.subscribe(subscriber));
            }));
            compound.add(scheduled);

            Some(compound.into())
        })
    }

    /// Send every event on `scheduler`.
    pub fn deliver_on(&self, scheduler: SchedulerRef) -> Signal<T> {
        let source = self.clone();
        Signal::create(move |subscriber| {
            let forward = Forward {
                scheduler: scheduler.clone(),
                subscriber,
            };
            let (next, error, completed) = (forward.clone(), forward.clone(), forward);

            Some(source.subscribe(Arc::new(FnSubscriber::new(
                move |value| next.schedule(move |s| s.send_next(value)),
                move |err| error.schedule(move |s| s.send_error(err)),
                move || completed.schedule(|s| s.send_completed()),
            ))))
        })
    }

    /// Send values and completion `interval` later than the receiver does.
    ///
    /// Errors are forwarded right away.
    pub fn delay(&self, interval: Duration, scheduler: SchedulerRef) -> Signal<T> {
        let source = self.clone();
        Signal::create(move |subscriber| {
            let compound = CompoundDisposable::new();
            let later = Later {
                scheduler: scheduler.clone(),
                interval,
                compound: compound.clone(),
            };

            let (next, completed) = (later.clone(), later);
            let (next_subscriber, error_subscriber, completed_subscriber) =
                (subscriber.clone(), subscriber.clone(), subscriber);

            compound.add(source.subscribe(Arc::new(FnSubscriber::new(
                move |value| {
                    let subscriber = next_subscriber.clone();
                    next.run(Box::new(move || subscriber.send_next(value)));
                },
                move |err| error_subscriber.send_error(err),
                move || {
                    let subscriber = completed_subscriber.clone();
                    completed.run(Box::new(move || subscriber.send_completed()));
                },
            ))));

            Some(compound.into())
        })
    }

    /// Fail with [`SignalError::Timeout`] unless the receiver terminates
    /// within `interval`.
    ///
    /// On timeout the receiver's subscription is disposed.
    pub fn timeout(&self, interval: Duration, scheduler: SchedulerRef) -> Signal<T> {
        let source = self.clone();
        Signal::create(move |subscriber| {
            let compound = CompoundDisposable::new();

            let timer = {
                let compound = compound.clone();
                let subscriber = subscriber.clone();
                scheduler.schedule_after(
                    interval,
                    Box::new(move || {
                        compound.dispose();
                        subscriber.send_error(SignalError::Timeout(interval));
                    }),
                )
            };
            compound.add(timer);

            let next = subscriber.clone();
            let (error, error_compound) = (subscriber.clone(), compound.clone());
            let (completed, completed_compound) = (subscriber, compound.clone());
            compound.add(source.subscribe(Arc::new(FnSubscriber::new(
                move |value| next.send_next(value),
                move |err| {
                    error_compound.dispose();
                    error.send_error(err);
                },
                move || {
                    completed_compound.dispose();
                    completed.send_completed();
                },
            ))));

            Some(compound.into())
        })
    }

    /// On error, switch to the signal returned by `handler`.
    pub fn catch<F>(&self, handler: F) -> Signal<T>
    where
        F: Fn(SignalError) -> Signal<T> + Send + Sync + 'static,
    {
        let source = self.clone();
        let handler = Arc::new(handler);
        Signal::create(move |subscriber| {
            let compound = CompoundDisposable::new();
            let recovery = SerialDisposable::new();
            compound.add(recovery.clone());

            let upstream = CompoundDisposable::new();
            compound.add(upstream.clone());

            let next = subscriber.clone();
            let completed = subscriber.clone();
            let handler = handler.clone();
            source.subscribe(Arc::new(FnSubscriber::with_disposable(
                upstream,
                move |value| next.send_next(value),
                move |err| {
                    recovery.set(handler(err).subscribe(subscriber.clone()));
                },
                move || completed.send_completed(),
            )));

            Some(compound.into())
        })
    }

    /// On error, switch to `signal`.
    pub fn catch_to(&self, signal: Signal<T>) -> Signal<T> {
        self.catch(move |_| signal.clone())
    }

    /// Resubscribe after an error, at most `count` times.
    ///
    /// The error that exhausts the retries is forwarded.
    pub fn retry(&self, count: usize) -> Signal<T> {
        let source = self.clone();
        Signal::create(move |subscriber| {
            let attempts = SerialDisposable::new();
            subscribe_retrying(source.clone(), subscriber, attempts.clone(), count);
            Some(attempts.into())
        })
    }
}

impl Signal<u64> {
    /// Send 0, 1, 2, ... on `scheduler`, one every `period`, forever.
    pub fn interval(period: Duration, scheduler: SchedulerRef) -> Signal<u64> {
        Signal::create(move |subscriber| {
            let ticks = AtomicU64::new(0);
            Some(schedule_repeating(&scheduler, period, move || {
                subscriber.send_next(ticks.fetch_add(1, Ordering::Relaxed));
            }))
        })
    }
}

#[derive(Clone)]
struct Forward<T> {
    scheduler: SchedulerRef,
    subscriber: SharedSubscriber<T>,
}

impl<T: Value> Forward<T> {
    fn schedule(&self, send: impl FnOnce(&SharedSubscriber<T>) + Send + 'static) {
        let subscriber = self.subscriber.clone();
        self.scheduler.schedule(Box::new(move || send(&subscriber)));
    }
}

#[derive(Clone)]
struct Later {
    scheduler: SchedulerRef,
    interval: Duration,
    compound: CompoundDisposable,
}

impl Later {
    fn run(&self, action: Action) {
        self.compound.add(self.scheduler.schedule_after(self.interval, action));
    }
}

fn subscribe_retrying<T: Value>(
    source: Signal<T>,
    subscriber: SharedSubscriber<T>,
    attempts: SerialDisposable,
    remaining: usize,
) {
    if attempts.is_disposed() {
        return;
    }

    // Registered before subscribing so a synchronous failure can replace it.
    let attempt = CompoundDisposable::new();
    attempts.set(attempt.clone());

    let next = subscriber.clone();
    let completed = subscriber.clone();
    let retry_source = source.clone();
    let retry_attempts = attempts.clone();
    source.subscribe(Arc::new(FnSubscriber::with_disposable(
        attempt,
        move |value| next.send_next(value),
        move |err| {
            if remaining == 0 {
                subscriber.send_error(err);
            } else {
                subscribe_retrying(
                    retry_source.clone(),
                    subscriber.clone(),
                    retry_attempts.clone(),
                    remaining - 1,
                );
            }
        },
        move || completed.send_completed(),
    )));
}
