//! The Stream Abstraction
//!
//! A stream is a monad over values: it can be empty, lift a single value,
//! and chain values into new streams with `bind`. Everything else is built
//! from those pieces plus `concat` and `zip_with`.
//!
//! [`Signal`](super::Signal) is the one concrete stream in this crate, but
//! the derived operators (such as [`map`](super::map) and
//! [`take`](super::take)) are written against this trait.

/// A value that can travel through a stream.
///
/// Values are cloned whenever a stream replays them, and may cross threads.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Send + Sync + 'static {}

/// A composable sequence of values.
pub trait Stream: Clone + Send + Sync + 'static {
    /// The values carried by the stream.
    type Item: Value;

    /// The same kind of stream, carrying `U` instead.
    type With<U: Value>: Stream<Item = U>;

    /// A stream that completes without sending anything.
    fn empty() -> Self;

    /// A stream that sends `value`, then completes.
    fn just(value: Self::Item) -> Self;

    /// Chain every value into a new stream.
    ///
    /// `factory` runs once per subscription and returns the block that sees
    /// each value. The block returns the stream to splice in, or `None` to
    /// stop taking values. Setting `stop` stops after the returned stream.
    ///
    /// Spliced streams run concurrently. The result completes once the
    /// receiver and every spliced stream have completed; the first error
    /// from any of them is forwarded and tears everything down.
    fn bind<U, F, B>(&self, factory: F) -> Self::With<U>
    where
        U: Value,
        F: Fn() -> B + Send + Sync + 'static,
        B: FnMut(Self::Item, &mut bool) -> Option<Self::With<U>> + Send + 'static;

    /// All of the receiver's values, then all of `other`'s.
    fn concat(&self, other: &Self) -> Self;

    /// Pair the nth value of the receiver with the nth value of `other`.
    ///
    /// Completes as soon as either side has completed and has no buffered
    /// values left to pair.
    fn zip_with<U: Value>(&self, other: &Self::With<U>) -> Self::With<(Self::Item, U)>;
}

/// Concatenate `streams` in order. Empty input gives an empty stream.
pub fn concat_all<S, I>(streams: I) -> S
where
    S: Stream,
    I: IntoIterator<Item = S>,
{
    streams
        .into_iter()
        .fold(S::empty(), |acc, stream| acc.concat(&stream))
}
