//! Reactive Primitives
//!
//! This module implements the stream engine: the [`Stream`] abstraction, the
//! cold [`Signal`], the subscriber contract, and the operators built on top.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal describes how to produce a sequence of values. It does nothing
//! until subscribed, and every subscription runs the description again. A
//! subscription ends with at most one terminal event: `completed` or an
//! error.
//!
//! ## Subscribers
//!
//! A Subscriber receives one subscription's events. [`FnSubscriber`] builds
//! one from callbacks; [`ReplaySubject`] is a subscriber that multicasts what
//! it receives.
//!
//! ## Bind
//!
//! Every operator is derived from `bind`, which splices a new signal in for
//! each value, plus `concat` and `zip_with`.
//!
//! # Implementation Notes
//!
//! Subscribing builds a small tree of disposables: one compound per
//! subscription, holding whatever the signal's source and its operators
//! attached. Disposing the root tears the whole tree down, and a passthrough
//! subscriber at every level drops events that arrive afterwards.

mod bind;
mod operators;
mod passthrough;
mod scheduled;
mod signal;
mod start;
mod stream;
mod subject;
mod subscriber;

#[cfg(test)]
mod testing;

pub use operators::{
    combine_previous_with_start, distinct_until_changed, filter, flatten_map, ignore, map, map_replace,
    reduce_each, scan_with_start, scan_with_start_indexed, skip, skip_until_block, skip_while_block,
    start_with, take, take_until_block, take_while_block,
};
pub use passthrough::PassthroughSubscriber;
pub use signal::Signal;
pub use stream::{concat_all, Stream, Value};
pub use subject::ReplaySubject;
pub use subscriber::{FnSubscriber, SharedSubscriber, Subscriber, SubscriberId};
