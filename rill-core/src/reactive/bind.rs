//! Bind, Concat and Zip
//!
//! The composition primitives every other operator is derived from.
//!
//! # Bind
//!
//! Each subscription to a bound signal tracks:
//!
//! - the downstream subscriber,
//! - a compound disposable holding the upstream subscription and every inner
//!   subscription that is still running,
//! - a count of active sources, starting at one for the upstream.
//!
//! Every inner signal the block returns bumps the count; every source that
//! completes drops it. Whoever brings it to zero sends `completed` and
//! disposes the compound. An error from any source disposes the compound and
//! is forwarded as is.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use super::{FnSubscriber, SharedSubscriber, Signal, Stream, Value};
use crate::disposable::{CompoundDisposable, DisposableId};
use crate::error::SignalError;

struct BindState<U> {
    subscriber: SharedSubscriber<U>,
    compound: CompoundDisposable,
    active: AtomicUsize,
}

impl<U: Value> BindState<U> {
    /// One source (upstream or inner) finished.
    fn complete(&self, finished: DisposableId) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "bind completed more sources than it started");

        if previous == 1 {
            self.subscriber.send_completed();
            self.compound.dispose();
        } else {
            self.compound.remove(finished);
        }
    }

    fn fail(&self, error: SignalError) {
        self.compound.dispose();
        self.subscriber.send_error(error);
    }

    fn add_signal(self: &Arc<Self>, signal: Signal<U>) {
        self.active.fetch_add(1, Ordering::AcqRel);

        let inner = CompoundDisposable::new();
        self.compound.add(inner.clone());
        let inner_id = inner.id();

        let next = self.clone();
        let error = self.clone();
        let completed = self.clone();
        let subscriber = FnSubscriber::with_disposable(
            inner,
            move |value| next.subscriber.send_next(value),
            move |err| error.fail(err),
            move || completed.complete(inner_id),
        );

        // The subscription registers itself with `inner`.
        signal.subscribe(Arc::new(subscriber));
    }
}

impl<T: Value> Signal<T> {
    /// Chain every value into a new signal. See [`Stream::bind`].
    pub fn bind<U, F, B>(&self, factory: F) -> Signal<U>
    where
        U: Value,
        F: Fn() -> B + Send + Sync + 'static,
        B: FnMut(T, &mut bool) -> Option<Signal<U>> + Send + 'static,
    {
        let source = self.clone();
        Signal::create(move |subscriber| {
            let block = Mutex::new(factory());
            let state = Arc::new(BindState {
                subscriber,
                compound: CompoundDisposable::new(),
                active: AtomicUsize::new(1),
            });

            let upstream = CompoundDisposable::new();
            state.compound.add(upstream.clone());
            let upstream_id = upstream.id();

            let on_next = {
                let state = state.clone();
                let upstream = upstream.clone();
                move |value: T| {
                    if state.compound.is_disposed() {
                        return;
                    }

                    let mut stop = false;
                    let signal = {
                        let mut block = block.lock();
                        (*block)(value, &mut stop)
                    };

                    let finished = signal.is_none() || stop;
                    if let Some(signal) = signal {
                        state.add_signal(signal);
                    }
                    if finished {
                        upstream.dispose();
                        state.complete(upstream_id);
                    }
                }
            };
            let on_error = {
                let state = state.clone();
                move |error| state.fail(error)
            };
            let on_completed = {
                let state = state.clone();
                move || state.complete(upstream_id)
            };

            source.subscribe(Arc::new(FnSubscriber::with_disposable(
                upstream,
                on_next,
                on_error,
                on_completed,
            )));

            Some(state.compound.clone().into())
        })
    }

    /// All of the receiver's values, then all of `other`'s.
    ///
    /// An error from either side ends the result immediately.
    pub fn concat(&self, other: &Signal<T>) -> Signal<T> {
        let first = self.clone();
        let second = other.clone();
        Signal::create(move |subscriber| {
            let compound = CompoundDisposable::new();

            let next = subscriber.clone();
            let error = subscriber.clone();
            let second = second.clone();
            let tail = compound.clone();
            let upstream = FnSubscriber::new(
                move |value| next.send_next(value),
                move |err| error.send_error(err),
                move || tail.add(second.subscribe(subscriber.clone())),
            );

            compound.add(first.subscribe(Arc::new(upstream)));
            Some(compound.into())
        })
    }

    /// Pair the nth value of the receiver with the nth value of `other`.
    ///
    /// The side that runs ahead is buffered. The result completes as soon as
    /// either side has completed with nothing left in its buffer.
    pub fn zip_with<U: Value>(&self, other: &Signal<U>) -> Signal<(T, U)> {
        let left = self.clone();
        let right = other.clone();
        Signal::create(move |subscriber| {
            let zip = Arc::new(Zip {
                subscriber,
                compound: CompoundDisposable::new(),
                state: ReentrantMutex::new(RefCell::new(ZipState::default())),
            });

            let (next, error, completed) = (zip.clone(), zip.clone(), zip.clone());
            let left_subscriber = FnSubscriber::new(
                move |value| next.push(Side::Left(value)),
                move |err| error.fail(err),
                move || completed.finish(Which::Left),
            );

            let (next, error, completed) = (zip.clone(), zip.clone(), zip.clone());
            let right_subscriber = FnSubscriber::new(
                move |value| next.push(Side::Right(value)),
                move |err| error.fail(err),
                move || completed.finish(Which::Right),
            );

            zip.compound.add(left.subscribe(Arc::new(left_subscriber)));
            zip.compound.add(right.subscribe(Arc::new(right_subscriber)));
            Some(zip.compound.clone().into())
        })
    }
}

enum Side<T, U> {
    Left(T),
    Right(U),
}

#[derive(Clone, Copy)]
enum Which {
    Left,
    Right,
}

struct ZipState<T, U> {
    left: VecDeque<T>,
    right: VecDeque<U>,
    left_done: bool,
    right_done: bool,
}

impl<T, U> Default for ZipState<T, U> {
    fn default() -> Self {
        Self {
            left: VecDeque::new(),
            right: VecDeque::new(),
            left_done: false,
            right_done: false,
        }
    }
}

struct Zip<T, U> {
    subscriber: SharedSubscriber<(T, U)>,
    compound: CompoundDisposable,
    state: ReentrantMutex<RefCell<ZipState<T, U>>>,
}

type ZipGuard<'a, T, U> = ReentrantMutexGuard<'a, RefCell<ZipState<T, U>>>;

impl<T: Value, U: Value> Zip<T, U> {
    fn push(&self, value: Side<T, U>) {
        let guard = self.state.lock();
        match value {
            Side::Left(value) => guard.borrow_mut().left.push_back(value),
            Side::Right(value) => guard.borrow_mut().right.push_back(value),
        }
        self.drain(&guard);
    }

    fn finish(&self, which: Which) {
        let guard = self.state.lock();
        match which {
            Which::Left => guard.borrow_mut().left_done = true,
            Which::Right => guard.borrow_mut().right_done = true,
        }
        self.drain(&guard);
    }

    fn fail(&self, error: SignalError) {
        let _guard = self.state.lock();
        if self.compound.is_disposed() {
            return;
        }
        self.compound.dispose();
        self.subscriber.send_error(error);
    }

    fn drain(&self, guard: &ZipGuard<'_, T, U>) {
        while let Some(pair) = Self::pop_pair(guard) {
            if self.compound.is_disposed() {
                return;
            }
            self.subscriber.send_next(pair);
        }

        let exhausted = {
            let state = guard.borrow();
            (state.left_done && state.left.is_empty()) || (state.right_done && state.right.is_empty())
        };
        if exhausted && !self.compound.is_disposed() {
            self.subscriber.send_completed();
            self.compound.dispose();
        }
    }

    fn pop_pair(guard: &ZipGuard<'_, T, U>) -> Option<(T, U)> {
        let mut state = guard.borrow_mut();
        if state.left.is_empty() || state.right.is_empty() {
            return None;
        }
        let left = state.left.pop_front()?;
        let right = state.right.pop_front()?;
        Some((left, right))
    }
}

impl<T: Value> Stream for Signal<T> {
    type Item = T;
    type With<U: Value> = Signal<U>;

    fn empty() -> Self {
        Signal::empty()
    }

    fn just(value: T) -> Self {
        Signal::just(value)
    }

    fn bind<U, F, B>(&self, factory: F) -> Self::With<U>
    where
        U: Value,
        F: Fn() -> B + Send + Sync + 'static,
        B: FnMut(Self::Item, &mut bool) -> Option<Self::With<U>> + Send + 'static,
    {
        Signal::bind(self, factory)
    }

    fn concat(&self, other: &Self) -> Self {
        Signal::concat(self, other)
    }

    fn zip_with<U: Value>(&self, other: &Self::With<U>) -> Self::With<(T, U)> {
        Signal::zip_with(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposable::Disposable;
    use crate::reactive::testing::{collect, Recorder};
    use crate::scheduler::{CurrentScheduler, Scheduler, VirtualScheduler};
    use std::time::Duration;

    fn numbers() -> Signal<i32> {
        Signal::from_values(vec![1, 2, 3, 4])
    }

    #[test]
    fn bind_splices_inner_signals() {
        let doubled = numbers().bind(|| {
            |x: i32, _: &mut bool| Some(Signal::from_values(vec![x, x]))
        });
        let (values, outcome) = collect(&doubled);
        assert_eq!(values, vec![1, 1, 2, 2, 3, 3, 4, 4]);
        assert!(outcome.is_completed());
    }

    #[test]
    fn bind_none_stops_upstream() {
        let until_three = numbers().bind(|| {
            |x: i32, _: &mut bool| if x == 3 { None } else { Some(Signal::just(x)) }
        });
        let (values, outcome) = collect(&until_three);
        assert_eq!(values, vec![1, 2]);
        assert!(outcome.is_completed());
    }

    #[test]
    fn bind_stop_keeps_last_signal() {
        let first_two = numbers().bind(|| {
            let mut seen = 0;
            move |x: i32, stop: &mut bool| {
                seen += 1;
                *stop = seen == 2;
                Some(Signal::just(x * 10))
            }
        });
        let (values, outcome) = collect(&first_two);
        assert_eq!(values, vec![10, 20]);
        assert_eq!(outcome.terminal_count(), 1);
    }

    #[test]
    fn bind_waits_for_inner_signals() {
        let virtual_time = VirtualScheduler::new();
        let timers = virtual_time.clone();

        let delayed = Signal::from_values(vec![1, 2]).bind(move || {
            let timers = timers.clone();
            move |x: i32, _: &mut bool| {
                let timers = timers.clone();
                Some(Signal::create(move |subscriber| {
                    Some(timers.schedule_after(
                        Duration::from_secs(x as u64),
                        Box::new(move || {
                            subscriber.send_next(x);
                            subscriber.send_completed();
                        }),
                    ))
                }))
            }
        });

        let recorder = Recorder::new();
        CurrentScheduler::run_as(Arc::new(virtual_time.clone()), || {
            delayed.subscribe(recorder.subscriber());
        });
        assert!(recorder.outcome().is_pending());

        virtual_time.advance_by(Duration::from_secs(1));
        assert_eq!(recorder.values(), vec![1]);
        assert!(recorder.outcome().is_pending());

        virtual_time.advance_by(Duration::from_secs(1));
        assert_eq!(recorder.values(), vec![1, 2]);
        assert!(recorder.outcome().is_completed());
    }

    #[test]
    fn bind_inner_error_disposes_everything() {
        let released = Arc::new(AtomicUsize::new(0));
        let released_clone = released.clone();
        let upstream = Signal::<i32>::create(move |subscriber| {
            subscriber.send_next(1);
            let released = released_clone.clone();
            Some(Disposable::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        });

        let failing = upstream.bind(|| |_: i32, _: &mut bool| Some(Signal::<i32>::error(SignalError::msg("inner"))));
        let (values, outcome) = collect(&failing);

        assert!(values.is_empty());
        assert_eq!(outcome.error().map(|e| e.to_string()), Some("inner".to_string()));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concat_runs_second_after_first() {
        let (values, outcome) = collect(&numbers().concat(&Signal::from_values(vec![5, 6])));
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
        assert!(outcome.is_completed());
    }

    #[test]
    fn concat_stops_at_first_error() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let second = Signal::<i32>::create(move |subscriber| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            subscriber.send_completed();
            None
        });

        let failing = Signal::<i32>::error(SignalError::msg("first"));
        let (_, outcome) = collect(&failing.concat(&second));

        assert!(outcome.error().is_some());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zip_pairs_by_position() {
        let letters = Signal::from_values(vec!["a", "b"]);
        let (values, outcome) = collect(&Signal::from_values(vec![1, 2, 3]).zip_with(&letters));
        assert_eq!(values, vec![(1, "a"), (2, "b")]);
        assert!(outcome.is_completed());
    }

    #[test]
    fn zip_forwards_errors() {
        let failing = Signal::<&str>::error(SignalError::msg("right"));
        let (values, outcome) = collect(&numbers().zip_with(&failing));
        assert!(values.is_empty());
        assert_eq!(outcome.error().map(|e| e.to_string()), Some("right".to_string()));
    }

    #[test]
    fn zip_with_never_keeps_waiting() {
        let (values, outcome) = collect(&Signal::<i32>::never().zip_with(&numbers()));
        assert!(values.is_empty());
        assert!(outcome.is_pending());
    }

    #[test]
    fn zip_with_empty_completes() {
        let (values, outcome) = collect(&Signal::<i32>::never().zip_with(&Signal::<i32>::empty()));
        assert!(values.is_empty());
        assert!(outcome.is_completed());
    }
}
