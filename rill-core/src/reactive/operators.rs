//! Derived Operators
//!
//! Every operator here is written in terms of [`Stream`]'s primitives, so it
//! works for any stream. [`Signal`] gets method versions of each.
//!
//! Per-subscription state (counters, accumulators, the previous value) lives
//! inside the block returned by the bind factory, so concurrent subscriptions
//! never share it.

use std::sync::Arc;

use super::{Signal, Stream, Value};

type Same<S> = <S as Stream>::With<<S as Stream>::Item>;

fn just<S: Stream, U: Value>(value: U) -> S::With<U> {
    <S::With<U> as Stream>::just(value)
}

fn empty<S: Stream, U: Value>() -> S::With<U> {
    <S::With<U> as Stream>::empty()
}

/// Splice the stream returned by `f` in place of each value.
pub fn flatten_map<S, U, F>(stream: &S, f: F) -> S::With<U>
where
    S: Stream,
    U: Value,
    F: Fn(S::Item) -> S::With<U> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    stream.bind::<U, _, _>(move || {
        let f = f.clone();
        move |value: S::Item, _: &mut bool| Some(f(value))
    })
}

/// Transform each value with `f`.
pub fn map<S, U, F>(stream: &S, f: F) -> S::With<U>
where
    S: Stream,
    U: Value,
    F: Fn(S::Item) -> U + Send + Sync + 'static,
{
    flatten_map::<S, U, _>(stream, move |value| just::<S, U>(f(value)))
}

/// Replace each value with `value`.
pub fn map_replace<S, U>(stream: &S, value: U) -> S::With<U>
where
    S: Stream,
    U: Value,
{
    map(stream, move |_| value.clone())
}

/// Keep only the values for which `predicate` holds.
pub fn filter<S, P>(stream: &S, predicate: P) -> Same<S>
where
    S: Stream,
    P: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
    flatten_map::<S, S::Item, _>(stream, move |value| {
        if predicate(&value) {
            just::<S, S::Item>(value)
        } else {
            empty::<S, S::Item>()
        }
    })
}

/// Drop every value equal to `value`.
pub fn ignore<S>(stream: &S, value: S::Item) -> Same<S>
where
    S: Stream,
    S::Item: PartialEq,
{
    filter(stream, move |candidate| *candidate != value)
}

/// The first `count` values, then completed.
///
/// The upstream is disposed as soon as the last value is taken.
pub fn take<S: Stream>(stream: &S, count: usize) -> Same<S> {
    if count == 0 {
        return empty::<S, S::Item>();
    }

    stream.bind::<S::Item, _, _>(move || {
        let mut taken = 0;
        move |value: S::Item, stop: &mut bool| {
            taken += 1;
            if taken >= count {
                *stop = true;
            }
            Some(just::<S, S::Item>(value))
        }
    })
}

/// Everything after the first `count` values.
pub fn skip<S: Stream>(stream: &S, count: usize) -> Same<S> {
    stream.bind::<S::Item, _, _>(move || {
        let mut skipped = 0;
        move |value: S::Item, _: &mut bool| {
            if skipped >= count {
                return Some(just::<S, S::Item>(value));
            }
            skipped += 1;
            Some(empty::<S, S::Item>())
        }
    })
}

/// Values up to (not including) the first one matching `predicate`.
pub fn take_until_block<S, P>(stream: &S, predicate: P) -> Same<S>
where
    S: Stream,
    P: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    stream.bind::<S::Item, _, _>(move || {
        let predicate = predicate.clone();
        move |value: S::Item, _: &mut bool| {
            if predicate(&value) {
                None
            } else {
                Some(just::<S, S::Item>(value))
            }
        }
    })
}

/// Values as long as `predicate` holds.
pub fn take_while_block<S, P>(stream: &S, predicate: P) -> Same<S>
where
    S: Stream,
    P: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
    take_until_block(stream, move |value| !predicate(value))
}

/// Values from the first one matching `predicate` onwards.
pub fn skip_until_block<S, P>(stream: &S, predicate: P) -> Same<S>
where
    S: Stream,
    P: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    stream.bind::<S::Item, _, _>(move || {
        let predicate = predicate.clone();
        let mut skipping = true;
        move |value: S::Item, _: &mut bool| {
            if skipping && !predicate(&value) {
                return Some(empty::<S, S::Item>());
            }
            skipping = false;
            Some(just::<S, S::Item>(value))
        }
    })
}

/// Values from the first one for which `predicate` fails onwards.
pub fn skip_while_block<S, P>(stream: &S, predicate: P) -> Same<S>
where
    S: Stream,
    P: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
    skip_until_block(stream, move |value| !predicate(value))
}

/// `value`, then everything from `stream`.
pub fn start_with<S: Stream>(stream: &S, value: S::Item) -> S {
    S::just(value).concat(stream)
}

/// Running accumulation of the values, starting from `start`.
///
/// Sends every intermediate result. `f` is never called for an empty stream.
pub fn scan_with_start<S, U, F>(stream: &S, start: U, f: F) -> S::With<U>
where
    S: Stream,
    U: Value,
    F: Fn(U, S::Item) -> U + Send + Sync + 'static,
{
    scan_with_start_indexed(stream, start, move |acc, value, _| f(acc, value))
}

/// Like [`scan_with_start`], also passing the zero-based index of the value.
pub fn scan_with_start_indexed<S, U, F>(stream: &S, start: U, f: F) -> S::With<U>
where
    S: Stream,
    U: Value,
    F: Fn(U, S::Item, usize) -> U + Send + Sync + 'static,
{
    let f = Arc::new(f);
    stream.bind::<U, _, _>(move || {
        let f = f.clone();
        let mut running = start.clone();
        let mut index = 0;
        move |value: S::Item, _: &mut bool| {
            running = f(running.clone(), value, index);
            index += 1;
            Some(just::<S, U>(running.clone()))
        }
    })
}

/// Combine each value with the one before it (`start` for the first).
///
/// Unlike a scan, the combined result is not fed back in.
pub fn combine_previous_with_start<S, U, F>(stream: &S, start: S::Item, f: F) -> S::With<U>
where
    S: Stream,
    U: Value,
    F: Fn(S::Item, S::Item) -> U + Send + Sync + 'static,
{
    let f = Arc::new(f);
    stream.bind::<U, _, _>(move || {
        let f = f.clone();
        let mut previous = start.clone();
        move |value: S::Item, _: &mut bool| {
            let previous = std::mem::replace(&mut previous, value.clone());
            Some(just::<S, U>(f(previous, value)))
        }
    })
}

/// Drop values equal to the last value sent.
pub fn distinct_until_changed<S>(stream: &S) -> Same<S>
where
    S: Stream,
    S::Item: PartialEq,
{
    stream.bind::<S::Item, _, _>(|| {
        let mut last: Option<S::Item> = None;
        move |value: S::Item, _: &mut bool| {
            if last.as_ref() == Some(&value) {
                return Some(empty::<S, S::Item>());
            }
            last = Some(value.clone());
            Some(just::<S, S::Item>(value))
        }
    })
}

/// Unpack each pair and combine its halves with `f`.
pub fn reduce_each<S, A, B, U, F>(stream: &S, f: F) -> S::With<U>
where
    S: Stream<Item = (A, B)>,
    A: Value,
    B: Value,
    U: Value,
    F: Fn(A, B) -> U + Send + Sync + 'static,
{
    map(stream, move |(a, b)| f(a, b))
}

impl<T: Value> Signal<T> {
    /// See [`flatten_map`].
    pub fn flatten_map<U, F>(&self, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(T) -> Signal<U> + Send + Sync + 'static,
    {
        flatten_map::<Self, U, F>(self, f)
    }

    /// See [`map`].
    pub fn map<U, F>(&self, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        map(self, f)
    }

    /// See [`map_replace`].
    pub fn map_replace<U: Value>(&self, value: U) -> Signal<U> {
        map_replace(self, value)
    }

    /// See [`filter`].
    pub fn filter<P>(&self, predicate: P) -> Signal<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        filter(self, predicate)
    }

    /// See [`ignore`].
    pub fn ignore(&self, value: T) -> Signal<T>
    where
        T: PartialEq,
    {
        ignore(self, value)
    }

    /// See [`take`].
    pub fn take(&self, count: usize) -> Signal<T> {
        take(self, count)
    }

    /// See [`skip`].
    pub fn skip(&self, count: usize) -> Signal<T> {
        skip(self, count)
    }

    /// See [`take_until_block`].
    pub fn take_until_block<P>(&self, predicate: P) -> Signal<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        take_until_block(self, predicate)
    }

    /// See [`take_while_block`].
    pub fn take_while_block<P>(&self, predicate: P) -> Signal<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        take_while_block(self, predicate)
    }

    /// See [`skip_until_block`].
    pub fn skip_until_block<P>(&self, predicate: P) -> Signal<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        skip_until_block(self, predicate)
    }

    /// See [`skip_while_block`].
    pub fn skip_while_block<P>(&self, predicate: P) -> Signal<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        skip_while_block(self, predicate)
    }

    /// See [`start_with`].
    pub fn start_with(&self, value: T) -> Signal<T> {
        start_with(self, value)
    }

    /// See [`scan_with_start`].
    pub fn scan_with_start<U, F>(&self, start: U, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(U, T) -> U + Send + Sync + 'static,
    {
        scan_with_start(self, start, f)
    }

    /// See [`scan_with_start_indexed`].
    pub fn scan_with_start_indexed<U, F>(&self, start: U, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(U, T, usize) -> U + Send + Sync + 'static,
    {
        scan_with_start_indexed(self, start, f)
    }

    /// See [`combine_previous_with_start`].
    pub fn combine_previous_with_start<U, F>(&self, start: T, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(T, T) -> U + Send + Sync + 'static,
    {
        combine_previous_with_start(self, start, f)
    }

    /// See [`distinct_until_changed`].
    pub fn distinct_until_changed(&self) -> Signal<T>
    where
        T: PartialEq,
    {
        distinct_until_changed(self)
    }

    /// Zip any number of signals into a signal of vectors.
    ///
    /// The nth vector holds the nth value of every signal, in order. No
    /// signals at all gives an empty signal.
    pub fn zip_all<I>(signals: I) -> Signal<Vec<T>>
    where
        I: IntoIterator<Item = Signal<T>>,
    {
        let mut signals = signals.into_iter();
        let Some(first) = signals.next() else {
            return Signal::empty();
        };

        signals.fold(first.map(|value| vec![value]), |zipped, signal| {
            zipped.zip_with(&signal).map(|(mut values, value)| {
                values.push(value);
                values
            })
        })
    }

    /// Zip `signals` and combine each row of values with `f`.
    pub fn zip_reduce<I, U, F>(signals: I, f: F) -> Signal<U>
    where
        I: IntoIterator<Item = Signal<T>>,
        U: Value,
        F: Fn(Vec<T>) -> U + Send + Sync + 'static,
    {
        Self::zip_all(signals).map(f)
    }
}

impl<T: Value> Signal<Signal<T>> {
    /// Merge the inner signals into one, running them concurrently.
    ///
    /// Completes once the outer signal and every inner signal have completed.
    pub fn flatten(&self) -> Signal<T> {
        self.flatten_map(|inner| inner)
    }
}

impl<A: Value, B: Value> Signal<(A, B)> {
    /// See [`reduce_each`].
    pub fn reduce_each<U, F>(&self, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(A, B) -> U + Send + Sync + 'static,
    {
        reduce_each(self, f)
    }
}
