//! Rill Core
//!
//! This crate provides the engine of the Rill push-based reactive stream
//! library. It implements:
//!
//! - Cold signals and the operators built from `bind`
//! - A subscriber contract with exactly-once termination
//! - A tree of disposables for hierarchical cancellation
//! - Schedulers, including a virtual-time scheduler for tests
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Streams, signals, subscribers, and operators
//! - `disposable`: Cancellation tokens and their compositions
//! - `scheduler`: Execution contexts and the current-scheduler tracking
//! - `error`: Error event payloads and API errors
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_core::Signal;
//!
//! let evens = Signal::from_values(1..=10)
//!     .filter(|x| x % 2 == 0)
//!     .map(|x| x * x);
//!
//! let disposable = evens.subscribe_next_completed(
//!     |x| println!("next: {x}"),
//!     || println!("done"),
//! );
//!
//! // Cancel whenever the values are no longer wanted.
//! disposable.dispose();
//! ```

pub mod disposable;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use disposable::{CompoundDisposable, Disposable, SerialDisposable};
pub use error::{Error, Result, SignalError};
pub use reactive::{FnSubscriber, ReplaySubject, SharedSubscriber, Signal, Stream, Subscriber, Value};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerRef, VirtualScheduler};
