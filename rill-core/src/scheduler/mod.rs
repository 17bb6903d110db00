//! Schedulers
//!
//! A scheduler is an execution context. It can run work "now" or after a
//! delay, and every piece of scheduled work comes back as a [`Disposable`]
//! that cancels it if it has not started yet. A running action is never
//! interrupted.
//!
//! # Kinds
//!
//! - [`ImmediateScheduler`]: runs work synchronously on the caller's thread.
//! - [`QueueScheduler`]: a serial queue on a dedicated worker thread. The
//!   [`main`] scheduler is a process-wide queue scheduler.
//! - [`SubscriptionScheduler`]: runs signal subscriptions. If the calling
//!   thread already has a current scheduler the work runs right away;
//!   otherwise it is handed to a private background queue.
//! - [`VirtualScheduler`]: a deterministic scheduler driven by a virtual
//!   clock, for tests.
//!
//! # Current Scheduler
//!
//! Schedulers that own an execution context make themselves the
//! [`CurrentScheduler`] while running an action, so code running inside can
//! find out where it is executing with [`current`].
//!
//! # Global Schedulers
//!
//! The main, immediate and subscription schedulers are process-wide
//! singletons, created on first use.

mod config;
mod context;
mod immediate;
mod queue;
mod subscription;
mod virtual_time;

pub use config::SchedulerConfig;
pub use context::CurrentScheduler;
pub use immediate::ImmediateScheduler;
pub use queue::QueueScheduler;
pub use subscription::SubscriptionScheduler;
pub use virtual_time::VirtualScheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::error;

use crate::disposable::{Disposable, SerialDisposable};
use crate::error::Result;

/// A unit of scheduled work.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// Unique identifier for a scheduler.
///
/// Handles to the same scheduler compare equal by id, which is how the
/// current scheduler is recognized across clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulerId(u64);

impl SchedulerId {
    /// Generate a new unique scheduler ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SchedulerId {
    fn default() -> Self {
        Self::new()
    }
}

/// An execution context that runs work now or after a delay.
pub trait Scheduler: Send + Sync + 'static {
    /// The scheduler's identity.
    fn id(&self) -> SchedulerId;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Schedule `action` to run as soon as possible.
    ///
    /// Disposing the returned disposable cancels the action if it has not
    /// started.
    fn schedule(&self, action: Action) -> Disposable;

    /// Schedule `action` to run after `delay`.
    fn schedule_after(&self, delay: Duration, action: Action) -> Disposable;
}

/// The scheduler executing on this thread, if any.
pub fn current() -> Option<SchedulerRef> {
    CurrentScheduler::get()
}

/// The process-wide scheduler that runs work synchronously.
pub fn immediate() -> SchedulerRef {
    static IMMEDIATE: OnceLock<SchedulerRef> = OnceLock::new();
    IMMEDIATE
        .get_or_init(|| Arc::new(ImmediateScheduler::new()))
        .clone()
}

/// The process-wide main queue.
///
/// A serial [`QueueScheduler`] shared by the whole process. If its worker
/// thread cannot be started, the failure is logged and the immediate
/// scheduler is used instead.
pub fn main() -> SchedulerRef {
    static MAIN: OnceLock<SchedulerRef> = OnceLock::new();
    MAIN.get_or_init(|| start_or_immediate(SchedulerConfig::named("rill.main")))
        .clone()
}

/// The scheduler used to run signal subscriptions.
pub fn subscription() -> SchedulerRef {
    static SUBSCRIPTION: OnceLock<SchedulerRef> = OnceLock::new();
    SUBSCRIPTION
        .get_or_init(|| Arc::new(SubscriptionScheduler::new()))
        .clone()
}

/// Create a new serial background scheduler with default settings.
pub fn background() -> Result<SchedulerRef> {
    background_with(SchedulerConfig::default())
}

/// Create a new serial background scheduler from `config`.
pub fn background_with(config: SchedulerConfig) -> Result<SchedulerRef> {
    let scheduler: SchedulerRef = Arc::new(QueueScheduler::new(config)?);
    Ok(scheduler)
}

/// Start a queue scheduler, falling back to the immediate scheduler.
pub(crate) fn start_or_immediate(config: SchedulerConfig) -> SchedulerRef {
    let name = config.name.clone();
    match QueueScheduler::new(config) {
        Ok(queue) => Arc::new(queue),
        Err(err) => {
            error!(scheduler = %name, error = %err, "falling back to the immediate scheduler");
            immediate()
        }
    }
}

/// Run `action` every `interval` on `scheduler` until the returned disposable
/// is disposed.
///
/// Each run is scheduled relative to the end of the previous one.
pub fn schedule_repeating<F>(scheduler: &SchedulerRef, interval: Duration, action: F) -> Disposable
where
    F: Fn() + Send + Sync + 'static,
{
    let serial = SerialDisposable::new();
    schedule_next(scheduler.clone(), interval, Arc::new(action), serial.clone());
    serial.into()
}

fn schedule_next(
    scheduler: SchedulerRef,
    interval: Duration,
    action: Arc<dyn Fn() + Send + Sync>,
    serial: SerialDisposable,
) {
    let tick = {
        let scheduler = scheduler.clone();
        let serial = serial.clone();
        move || {
            if serial.is_disposed() {
                return;
            }
            action();
            schedule_next(scheduler, interval, action, serial);
        }
    };

    serial.set(scheduler.schedule_after(interval, Box::new(tick)));
}
