//! Virtual Time
//!
//! A scheduler driven by a manual clock. Nothing runs until the clock is
//! advanced, which makes time-based operators testable without sleeping.
//!
//! Work scheduled for the same instant runs in the order it was scheduled.
//! Actions run on the thread that advances the clock, with the virtual
//! scheduler as the current scheduler, and may schedule more work; anything
//! that falls inside the window being advanced runs in the same call.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::{Action, CurrentScheduler, Scheduler, SchedulerId};
use crate::disposable::Disposable;

type Key = (Duration, u64);

struct Clock {
    now: Duration,
    seq: u64,
    queue: BTreeMap<Key, Action>,
}

struct VirtualInner {
    id: SchedulerId,
    clock: Mutex<Clock>,
}

/// A deterministic scheduler with a manually advanced clock.
///
/// Cloning yields another handle to the same clock.
#[derive(Clone)]
pub struct VirtualScheduler {
    inner: Arc<VirtualInner>,
}

impl VirtualScheduler {
    /// Create a scheduler whose clock starts at zero.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(VirtualInner {
                id: SchedulerId::new(),
                clock: Mutex::new(Clock {
                    now: Duration::ZERO,
                    seq: 0,
                    queue: BTreeMap::new(),
                }),
            }),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.clock.lock().now
    }

    /// Number of actions waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.clock.lock().queue.len()
    }

    /// Run the earliest pending action, moving the clock to its due time.
    ///
    /// Returns `false` if nothing was pending.
    pub fn step(&self) -> bool {
        self.run_next(None)
    }

    /// Run up to `n` pending actions. Returns how many ran.
    pub fn step_n(&self, n: usize) -> usize {
        (0..n).take_while(|_| self.step()).count()
    }

    /// Advance the clock by `delta`, running everything due on the way.
    pub fn advance_by(&self, delta: Duration) {
        let target = self.now() + delta;
        self.advance_to(target);
    }

    /// Advance the clock to `target`, running everything due on the way.
    ///
    /// The clock never moves backwards; a target in the past only runs work
    /// that is already due.
    pub fn advance_to(&self, target: Duration) {
        while self.run_next(Some(target)) {}

        let mut clock = self.inner.clock.lock();
        if clock.now < target {
            clock.now = target;
        }
    }

    /// Run until nothing is pending. Returns how many actions ran.
    ///
    /// Never returns if the scheduled work keeps rescheduling itself.
    pub fn run(&self) -> usize {
        let mut count = 0;
        while self.step() {
            count += 1;
        }
        count
    }

    fn enqueue(&self, delay: Duration, action: Action) -> Disposable {
        let key = {
            let mut clock = self.inner.clock.lock();
            let key = (clock.now + delay, clock.seq);
            clock.seq += 1;
            clock.queue.insert(key, action);
            key
        };

        let inner: Weak<VirtualInner> = Arc::downgrade(&self.inner);
        Disposable::new(move || {
            if let Some(inner) = inner.upgrade() {
                // Drop the action after releasing the lock.
                let removed = inner.clock.lock().queue.remove(&key);
                drop(removed);
            }
        })
    }

    fn run_next(&self, limit: Option<Duration>) -> bool {
        let (due, action) = {
            let mut clock = self.inner.clock.lock();
            let Some(entry) = clock.queue.first_entry() else {
                return false;
            };
            let due = entry.key().0;
            if limit.is_some_and(|limit| due > limit) {
                return false;
            }
            let action = entry.remove();
            if due > clock.now {
                clock.now = due;
            }
            (due, action)
        };

        trace!(at = ?due, "virtual scheduler running action");
        CurrentScheduler::run_as(Arc::new(self.clone()), action);
        true
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn id(&self) -> SchedulerId {
        self.inner.id
    }

    fn name(&self) -> &str {
        "rill.virtual"
    }

    fn schedule(&self, action: Action) -> Disposable {
        self.enqueue(Duration::ZERO, action)
    }

    fn schedule_after(&self, delay: Duration, action: Action) -> Disposable {
        self.enqueue(delay, action)
    }
}

impl std::fmt::Debug for VirtualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clock = self.inner.clock.lock();
        f.debug_struct("VirtualScheduler")
            .field("id", &self.inner.id)
            .field("now", &clock.now)
            .field("pending", &clock.queue.len())
            .finish()
    }
}
