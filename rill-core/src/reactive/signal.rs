//! Signal Implementation
//!
//! A Signal is a cold, push-based stream. It holds a description of how to
//! produce values and runs that description again for every subscriber.
//!
//! # How Signals Work
//!
//! 1. Nothing happens until `subscribe` is called.
//!
//! 2. Subscribing creates a compound disposable for the subscription and
//!    wraps the subscriber in a [`PassthroughSubscriber`] tied to it.
//!
//! 3. The signal's source runs on the subscription scheduler and pushes
//!    events into the passthrough. Whatever disposable the source returns
//!    joins the subscription's compound.
//!
//! 4. Disposing the returned disposable stops delivery immediately and tears
//!    down everything the source attached.
//!
//! # Variants
//!
//! The constant signals (`empty`, `just`, `error`, `never`) are stored as
//! plain variants; everything else is a subscription function built with
//! [`Signal::create`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::{FnSubscriber, PassthroughSubscriber, SharedSubscriber, Value};
use crate::disposable::{CompoundDisposable, Disposable};
use crate::error::SignalError;
use crate::scheduler;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type SubscribeFn<T> = dyn Fn(SharedSubscriber<T>) -> Option<Disposable> + Send + Sync;

enum Source<T> {
    Empty,
    Return(T),
    Error(SignalError),
    Never,
    Dynamic(Box<SubscribeFn<T>>),
}

impl<T: Value> Source<T> {
    fn run(&self, subscriber: SharedSubscriber<T>) -> Option<Disposable> {
        match self {
            Source::Empty => {
                subscriber.send_completed();
                None
            }
            Source::Return(value) => {
                subscriber.send_next(value.clone());
                subscriber.send_completed();
                None
            }
            Source::Error(error) => {
                subscriber.send_error(error.clone());
                None
            }
            Source::Never => None,
            Source::Dynamic(subscribe) => subscribe(subscriber),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Source::Empty => "empty",
            Source::Return(_) => "just",
            Source::Error(_) => "error",
            Source::Never => "never",
            Source::Dynamic(_) => "dynamic",
        }
    }
}

/// A cold stream of values of type `T`.
///
/// # Type Parameters
///
/// - `T`: The type of value sent by the signal. Must be a [`Value`].
///
/// # Example
///
/// ```rust,ignore
/// let numbers = Signal::from_values(vec![1, 2, 3, 4]);
///
/// let disposable = numbers
///     .map(|x| x * 2)
///     .filter(|x| *x > 4)
///     .subscribe_next(|x| println!("{x}"));
///
/// // Stop listening early.
/// disposable.dispose();
/// ```
pub struct Signal<T> {
    /// Unique identifier, shared by clones.
    id: u64,

    source: Arc<Source<T>>,

    /// Optional name recorded in tracing events.
    name: Option<Arc<str>>,
}

impl<T: Value> Signal<T> {
    fn from_source(source: Source<T>) -> Self {
        Self {
            id: next_signal_id(),
            source: Arc::new(source),
            name: None,
        }
    }

    /// Create a signal from a subscription function.
    ///
    /// `subscribe` runs once per subscription. It may send events
    /// synchronously or hand the subscriber to other threads, and may return
    /// a disposable that releases whatever it set up.
    pub fn create<F>(subscribe: F) -> Self
    where
        F: Fn(SharedSubscriber<T>) -> Option<Disposable> + Send + Sync + 'static,
    {
        Self::from_source(Source::Dynamic(Box::new(subscribe)))
    }

    /// A signal that completes immediately.
    pub fn empty() -> Self {
        Self::from_source(Source::Empty)
    }

    /// A signal that sends `value`, then completes.
    pub fn just(value: T) -> Self {
        Self::from_source(Source::Return(value))
    }

    /// A signal that fails immediately with `error`.
    pub fn error(error: SignalError) -> Self {
        Self::from_source(Source::Error(error))
    }

    /// A signal that never sends anything.
    pub fn never() -> Self {
        Self::from_source(Source::Never)
    }

    /// A signal that sends each of `values` in order, then completes.
    ///
    /// Values are sent synchronously; sending stops as soon as the
    /// subscription is disposed.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Arc<[T]> = values.into_iter().collect();
        Self::create(move |subscriber| {
            for value in values.iter() {
                if subscriber.is_disposed() {
                    return None;
                }
                subscriber.send_next(value.clone());
            }
            subscriber.send_completed();
            None
        })
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name the signal for tracing output.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The signal's name, if one was set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Subscribe `subscriber` to the signal.
    ///
    /// Returns the disposable tracking the subscription. Disposing it stops
    /// all further events to `subscriber` and releases the subscription's
    /// resources.
    pub fn subscribe(&self, subscriber: SharedSubscriber<T>) -> Disposable {
        let compound = CompoundDisposable::new();
        let passthrough: SharedSubscriber<T> = Arc::new(PassthroughSubscriber::new(
            subscriber,
            compound.clone(),
            self.name.clone(),
        ));

        trace!(
            signal = self.name().unwrap_or("anonymous"),
            id = self.id,
            kind = self.source.kind(),
            "subscribing"
        );

        let source = self.source.clone();
        let subscription = compound.clone();
        let scheduled = scheduler::subscription().schedule(Box::new(move || {
            if let Some(disposable) = source.run(passthrough) {
                subscription.add(disposable);
            }
        }));
        compound.add(scheduled);

        compound.into()
    }

    fn subscribe_with<N, E, C>(&self, next: N, error: E, completed: C) -> Disposable
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(SignalError) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber::new(next, error, completed)))
    }

    /// Subscribe to values only.
    pub fn subscribe_next<N>(&self, next: N) -> Disposable
    where
        N: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with(next, |_| {}, || {})
    }

    /// Subscribe to values and completion.
    pub fn subscribe_next_completed<N, C>(&self, next: N, completed: C) -> Disposable
    where
        N: Fn(T) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe_with(next, |_| {}, completed)
    }

    /// Subscribe to values and errors.
    pub fn subscribe_next_error<N, E>(&self, next: N, error: E) -> Disposable
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(SignalError) + Send + Sync + 'static,
    {
        self.subscribe_with(next, error, || {})
    }

    /// Subscribe to every event.
    pub fn subscribe_next_error_completed<N, E, C>(&self, next: N, error: E, completed: C) -> Disposable
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(SignalError) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe_with(next, error, completed)
    }

    /// Subscribe to errors only.
    pub fn subscribe_error<E>(&self, error: E) -> Disposable
    where
        E: Fn(SignalError) + Send + Sync + 'static,
    {
        self.subscribe_with(|_| {}, error, || {})
    }

    /// Subscribe to completion only.
    pub fn subscribe_completed<C>(&self, completed: C) -> Disposable
    where
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe_with(|_| {}, |_| {}, completed)
    }

    /// Subscribe to both terminal events.
    pub fn subscribe_error_completed<E, C>(&self, error: E, completed: C) -> Disposable
    where
        E: Fn(SignalError) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe_with(|_| {}, error, completed)
    }
}

impl<T: Value> FromIterator<T> for Signal<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            source: Arc::clone(&self.source),
            name: self.name.clone(),
        }
    }
}

impl<T: Value> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.source.kind())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
