//! Subscriber types for the reactive system.
//!
//! A Subscriber is the sink for one subscription's events: any number of
//! `next` values followed by at most one terminal event (`error` or
//! `completed`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::Value;
use crate::disposable::{CompoundDisposable, Disposable};
use crate::error::SignalError;

/// Unique identifier for a subscriber.
///
/// Multicasting sources (such as a replay subject) use it to find a
/// subscriber again when its subscription is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives the events of a subscription.
///
/// Events may arrive from any thread. Implementations must tolerate
/// concurrent `send_next` calls and must ignore everything after the first
/// terminal event.
pub trait Subscriber<T>: Send + Sync {
    /// Deliver a value.
    fn send_next(&self, value: T);

    /// Terminate with an error.
    fn send_error(&self, error: SignalError);

    /// Terminate successfully.
    fn send_completed(&self);

    /// Called once per subscription with the disposable tracking it.
    ///
    /// A subscriber that terminates (or is otherwise torn down) can dispose
    /// the subscriptions it was attached to.
    fn did_subscribe_with(&self, _disposable: &CompoundDisposable) {}

    /// Whether the subscriber stopped accepting events.
    ///
    /// Producers sending many values synchronously should check this and
    /// stop early.
    fn is_disposed(&self) -> bool {
        false
    }
}

/// Shared handle to a subscriber.
pub type SharedSubscriber<T> = Arc<dyn Subscriber<T>>;

type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorFn = Box<dyn Fn(SignalError) + Send + Sync>;
type CompletedFn = Box<dyn Fn() + Send + Sync>;

struct Callbacks<T> {
    next: NextFn<T>,
    error: ErrorFn,
    completed: CompletedFn,
}

/// A subscriber built from callbacks.
///
/// Events are serialized through a reentrant gate, so callbacks never run
/// concurrently with each other but may re-enter from the same thread. The
/// first terminal event disposes the subscriber's disposable, which drops the
/// callbacks and tears down every subscription the subscriber was attached
/// to.
pub struct FnSubscriber<T> {
    id: SubscriberId,
    gate: ReentrantMutex<()>,
    callbacks: Arc<Mutex<Option<Arc<Callbacks<T>>>>>,
    disposable: CompoundDisposable,
}

impl<T: Value> FnSubscriber<T> {
    /// Create a subscriber from the three event callbacks.
    pub fn new<N, E, C>(next: N, error: E, completed: C) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(SignalError) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        Self::with_disposable(CompoundDisposable::new(), next, error, completed)
    }

    /// Create a subscriber that owns `disposable`.
    ///
    /// Disposing `disposable` from outside silences the subscriber and
    /// cancels the subscriptions it is attached to.
    pub fn with_disposable<N, E, C>(disposable: CompoundDisposable, next: N, error: E, completed: C) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
        E: Fn(SignalError) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        let callbacks = Arc::new(Mutex::new(Some(Arc::new(Callbacks {
            next: Box::new(next) as NextFn<T>,
            error: Box::new(error) as ErrorFn,
            completed: Box::new(completed) as CompletedFn,
        }))));

        let slot = Arc::downgrade(&callbacks);
        disposable.add(Disposable::new(move || {
            if let Some(slot) = slot.upgrade() {
                let released = slot.lock().take();
                drop(released);
            }
        }));

        Self {
            id: SubscriberId::new(),
            gate: ReentrantMutex::new(()),
            callbacks,
            disposable,
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The disposable owned by this subscriber.
    pub fn disposable(&self) -> &CompoundDisposable {
        &self.disposable
    }

    fn callbacks(&self) -> Option<Arc<Callbacks<T>>> {
        self.callbacks.lock().clone()
    }
}

impl<T: Value> Subscriber<T> for FnSubscriber<T> {
    fn send_next(&self, value: T) {
        let _gate = self.gate.lock();
        if let Some(callbacks) = self.callbacks() {
            (callbacks.next)(value);
        }
    }

    fn send_error(&self, error: SignalError) {
        let _gate = self.gate.lock();
        let callbacks = self.callbacks();
        self.disposable.dispose();
        if let Some(callbacks) = callbacks {
            (callbacks.error)(error);
        }
    }

    fn send_completed(&self) {
        let _gate = self.gate.lock();
        let callbacks = self.callbacks();
        self.disposable.dispose();
        if let Some(callbacks) = callbacks {
            (callbacks.completed)();
        }
    }

    fn did_subscribe_with(&self, subscription: &CompoundDisposable) {
        if subscription.is_disposed() {
            return;
        }

        self.disposable.add(subscription.clone());

        // Forget the subscription once it is disposed on its own.
        let owner = self.disposable.downgrade();
        let id = subscription.id();
        subscription.add(Disposable::new(move || {
            if let Some(owner) = owner.upgrade() {
                owner.remove_child(id);
            }
        }));
    }

    fn is_disposed(&self) -> bool {
        self.disposable.is_disposed()
    }
}

impl<T> std::fmt::Debug for FnSubscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSubscriber")
            .field("id", &self.id)
            .field("disposed", &self.disposable.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (FnSubscriber<i32>, Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let nexts = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let completions = Arc::new(AtomicUsize::new(0));
        let (n, e, c) = (nexts.clone(), errors.clone(), completions.clone());

        let subscriber = FnSubscriber::new(
            move |_| {
                n.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );
        (subscriber, nexts, errors, completions)
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn terminal_event_is_delivered_once() {
        let (subscriber, nexts, errors, completions) = counting();

        subscriber.send_next(1);
        subscriber.send_completed();
        subscriber.send_completed();
        subscriber.send_error(SignalError::msg("late"));
        subscriber.send_next(2);

        assert_eq!(nexts.load(Ordering::SeqCst), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert!(subscriber.is_disposed());
    }

    #[test]
    fn terminal_event_disposes_attached_subscriptions() {
        let (subscriber, _, _, _) = counting();
        let subscription = CompoundDisposable::new();

        subscriber.did_subscribe_with(&subscription);
        subscriber.send_error(SignalError::msg("boom"));

        assert!(subscription.is_disposed());
    }

    #[test]
    fn disposed_subscriptions_are_forgotten() {
        let (subscriber, _, _, _) = counting();
        let subscription = CompoundDisposable::new();

        subscriber.did_subscribe_with(&subscription);
        assert!(subscriber.disposable().len() > 1);

        subscription.dispose();
        assert_eq!(subscriber.disposable().len(), 1);
        assert!(!subscriber.is_disposed());
    }

    #[test]
    fn disposing_owned_disposable_silences_callbacks() {
        let (subscriber, nexts, _, completions) = counting();

        subscriber.disposable().dispose();
        subscriber.send_next(1);
        subscriber.send_completed();

        assert_eq!(nexts.load(Ordering::SeqCst), 0);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callbacks_may_reenter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let holder: Arc<Mutex<Option<Arc<FnSubscriber<i32>>>>> = Arc::new(Mutex::new(None));

        let (seen_clone, holder_clone) = (seen.clone(), holder.clone());
        let subscriber = Arc::new(FnSubscriber::new(
            move |value| {
                seen_clone.lock().push(value);
                if value == 1 {
                    let me = holder_clone.lock().clone();
                    if let Some(me) = me {
                        me.send_next(2);
                    }
                }
            },
            |_| {},
            || {},
        ));
        *holder.lock() = Some(subscriber.clone());

        subscriber.send_next(1);
        assert_eq!(*seen.lock(), vec![1, 2]);

        holder.lock().take();
    }

    #[test]
    fn concurrent_producers_are_serialized() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 10_000;

        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let delivered = Arc::new(AtomicUsize::new(0));

        let subscriber = {
            let (inside, overlaps, delivered) = (inside.clone(), overlaps.clone(), delivered.clone());
            Arc::new(FnSubscriber::new(
                move |_: usize| {
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    delivered.fetch_add(1, Ordering::SeqCst);
                    inside.fetch_sub(1, Ordering::SeqCst);
                },
                |_| {},
                || {},
            ))
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let subscriber = subscriber.clone();
                std::thread::spawn(move || {
                    for value in 0..PER_PRODUCER {
                        subscriber.send_next(value);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(delivered.load(Ordering::SeqCst), PRODUCERS * PER_PRODUCER);
    }
}
