//! Replay Subject
//!
//! A subject is both ends of a pipe: producers push events into it through
//! the [`Subscriber`] trait, and any number of subscribers listen through
//! [`ReplaySubject::signal`]. The replay subject also remembers what it has
//! seen, so a late subscriber first receives the recorded values (and the
//! terminal event, if there was one) before anything new.
//!
//! # Thread Safety
//!
//! State sits behind a reentrant gate. Recording, fan-out and replay all
//! happen while holding it, so a subscriber that joins concurrently with a
//! new value sees that value exactly once: either replayed or delivered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::trace;

use super::{SharedSubscriber, Signal, Subscriber, SubscriberId, Value};
use crate::disposable::{CompoundDisposable, Disposable};
use crate::error::SignalError;

#[derive(Clone)]
enum Terminal {
    Completed,
    Error(SignalError),
}

struct ReplayState<T> {
    values: VecDeque<T>,
    terminal: Option<Terminal>,
    subscribers: Vec<(SubscriberId, SharedSubscriber<T>)>,
}

struct SubjectInner<T> {
    gate: ReentrantMutex<RefCell<ReplayState<T>>>,
    disposable: CompoundDisposable,
    capacity: Option<usize>,
}

/// A multicasting subscriber that replays its history to new subscribers.
///
/// Cloning yields another handle to the same subject.
pub struct ReplaySubject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T: Value> ReplaySubject<T> {
    /// A subject that remembers every value.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A subject that remembers only the latest `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(Some(capacity))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                gate: ReentrantMutex::new(RefCell::new(ReplayState {
                    values: VecDeque::new(),
                    terminal: None,
                    subscribers: Vec::new(),
                })),
                disposable: CompoundDisposable::new(),
                capacity,
            }),
        }
    }

    /// A signal of the subject's events, starting with its history.
    pub fn signal(&self) -> Signal<T> {
        let inner = self.inner.clone();
        Signal::create(move |subscriber| {
            let guard = inner.gate.lock();
            let (history, terminal) = {
                let state = guard.borrow();
                (state.values.iter().cloned().collect::<Vec<_>>(), state.terminal.clone())
            };

            for value in history {
                if subscriber.is_disposed() {
                    return None;
                }
                subscriber.send_next(value);
            }

            match terminal {
                Some(Terminal::Completed) => {
                    subscriber.send_completed();
                    return None;
                }
                Some(Terminal::Error(error)) => {
                    subscriber.send_error(error);
                    return None;
                }
                None => {}
            }

            let id = SubscriberId::new();
            guard.borrow_mut().subscribers.push((id, subscriber));
            drop(guard);

            let inner = Arc::downgrade(&inner);
            Some(Disposable::new(move || {
                if let Some(inner) = inner.upgrade() {
                    let guard = inner.gate.lock();
                    let removed = {
                        let mut state = guard.borrow_mut();
                        let position = state.subscribers.iter().position(|(sid, _)| *sid == id);
                        position.map(|position| state.subscribers.remove(position))
                    };
                    drop(removed);
                }
            }))
        })
    }

    /// Number of subscribers currently listening.
    pub fn subscriber_count(&self) -> usize {
        self.inner.gate.lock().borrow().subscribers.len()
    }

    fn terminate(&self, terminal: Terminal) {
        let guard = self.inner.gate.lock();
        let subscribers = {
            let mut state = guard.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal.clone());
            std::mem::take(&mut state.subscribers)
        };

        self.inner.disposable.dispose();
        trace!(subscribers = subscribers.len(), "replay subject terminated");

        for (_, subscriber) in subscribers {
            match &terminal {
                Terminal::Completed => subscriber.send_completed(),
                Terminal::Error(error) => subscriber.send_error(error.clone()),
            }
        }
    }
}

impl<T: Value> Subscriber<T> for ReplaySubject<T> {
    fn send_next(&self, value: T) {
        let guard = self.inner.gate.lock();
        let subscribers: Vec<SharedSubscriber<T>> = {
            let mut state = guard.borrow_mut();
            if state.terminal.is_some() {
                return;
            }

            state.values.push_back(value.clone());
            if let Some(capacity) = self.inner.capacity {
                while state.values.len() > capacity {
                    state.values.pop_front();
                }
            }
            state.subscribers.iter().map(|(_, s)| s.clone()).collect()
        };

        for subscriber in subscribers {
            subscriber.send_next(value.clone());
        }
    }

    fn send_error(&self, error: SignalError) {
        self.terminate(Terminal::Error(error));
    }

    fn send_completed(&self) {
        self.terminate(Terminal::Completed);
    }

    fn did_subscribe_with(&self, disposable: &CompoundDisposable) {
        if disposable.is_disposed() {
            return;
        }

        self.inner.disposable.add(disposable.clone());

        // Forget the upstream once it ends on its own.
        let owner = self.inner.disposable.downgrade();
        let id = disposable.id();
        disposable.add(Disposable::new(move || {
            if let Some(owner) = owner.upgrade() {
                owner.remove_child(id);
            }
        }));
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposable.is_disposed()
    }
}

impl<T: Value> Default for ReplaySubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ReplaySubject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ReplaySubject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySubject")
            .field("capacity", &self.inner.capacity)
            .field("disposed", &self.inner.disposable.is_disposed())
            .finish()
    }
}
