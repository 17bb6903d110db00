//! Queue Scheduler
//!
//! A serial execution context backed by a dedicated worker thread.
//!
//! # How It Works
//!
//! 1. Each queue scheduler owns one OS thread that pulls jobs off an
//!    unbounded channel and runs them one at a time, in order.
//!
//! 2. Delayed jobs wait in a per-scheduler timer queue keyed by
//!    `(deadline, sequence)`. One driver task on a shared tokio runtime
//!    sleeps until the earliest deadline and moves due jobs onto the channel
//!    in key order, so jobs with the same deadline run in the order they
//!    were scheduled.
//!
//! 3. While a job runs, the scheduler is the thread's current scheduler.
//!    A panicking job is logged and the worker moves on to the next one.
//!
//! Cancelling a job marks it disposed (the worker skips it) and, for delayed
//! jobs, removes it from the timer queue. A job that already started runs to
//! the end.
//!
//! The worker only holds a weak reference to the scheduler. Once every handle
//! is dropped and no timers are pending, the channel closes and the thread
//! exits.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, trace, warn};

use super::{Action, CurrentScheduler, Scheduler, SchedulerConfig, SchedulerId};
use crate::disposable::Disposable;
use crate::error::{Error, Result};

/// Runtime whose only job is driving delayed-work timers.
static TIMERS: OnceLock<Runtime> = OnceLock::new();

fn timer_handle() -> Result<Handle> {
    if let Some(runtime) = TIMERS.get() {
        return Ok(runtime.handle().clone());
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("rill-timer")
        .enable_time()
        .build()
        .map_err(Error::TimerRuntime)?;

    // Lost a race with another thread; keep theirs.
    if let Err(spare) = TIMERS.set(runtime) {
        spare.shutdown_background();
    }
    timer_handle()
}

struct Job {
    action: Action,
    cancel: Disposable,
}

type TimerKey = (Instant, u64);

/// Deadline used when `now + delay` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Default)]
struct Pending {
    next_seq: u64,
    jobs: BTreeMap<TimerKey, Job>,
}

/// Delayed jobs of one queue, waiting for their deadline.
struct TimerQueue {
    pending: Mutex<Pending>,
    wake: Notify,
    closed: AtomicBool,
    jobs: UnboundedSender<Job>,
}

impl TimerQueue {
    fn new(jobs: UnboundedSender<Job>) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            jobs,
        }
    }

    fn insert(self: &Arc<Self>, delay: Duration, action: Action) -> Disposable {
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE);

        let mut pending = self.pending.lock();
        let key = (deadline, pending.next_seq);
        pending.next_seq += 1;

        let queue = Arc::downgrade(self);
        let cancel = Disposable::new(move || {
            if let Some(queue) = queue.upgrade() {
                queue.remove(key);
            }
        });
        pending.jobs.insert(
            key,
            Job {
                action,
                cancel: cancel.clone(),
            },
        );
        drop(pending);

        self.wake.notify_one();
        cancel
    }

    fn remove(&self, key: TimerKey) {
        let removed = self.pending.lock().jobs.remove(&key);
        drop(removed);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.lock().jobs.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Take every job due at `now`, earliest key first.
    fn take_due(&self, now: Instant) -> Vec<Job> {
        let mut pending = self.pending.lock();
        let mut due = Vec::new();
        while let Some(entry) = pending.jobs.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

async fn drive_timers(timers: Arc<TimerQueue>, name: String) {
    trace!(scheduler = %name, "timer driver started");

    loop {
        match timers.next_deadline() {
            Some(deadline) => {
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    _ = timers.wake.notified() => {}
                }
            }
            None if timers.closed.load(Ordering::Acquire) => break,
            None => timers.wake.notified().await,
        }

        for job in timers.take_due(Instant::now()) {
            if timers.jobs.send(job).is_err() {
                warn!(scheduler = %name, "worker has exited; dropping delayed job");
            }
        }
    }

    trace!(scheduler = %name, "timer driver stopped");
}

struct QueueInner {
    id: SchedulerId,
    name: String,
    jobs: UnboundedSender<Job>,
    timers: Arc<TimerQueue>,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        self.timers.close();
    }
}

/// A serial scheduler running on its own worker thread.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct QueueScheduler {
    inner: Arc<QueueInner>,
}

impl QueueScheduler {
    /// Start a new queue scheduler.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let runtime = timer_handle()?;
        let (jobs, receiver) = mpsc::unbounded_channel();
        let timers = Arc::new(TimerQueue::new(jobs.clone()));

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let inner = Arc::new(QueueInner {
            id: SchedulerId::new(),
            name: config.name.clone(),
            jobs,
            timers: timers.clone(),
        });

        let worker_inner = Arc::downgrade(&inner);
        let worker_name = config.name.clone();
        builder
            .spawn(move || run_worker(worker_inner, receiver, worker_name))
            .map_err(|source| Error::SpawnWorker {
                name: config.name.clone(),
                source,
            })?;

        runtime.spawn(drive_timers(timers, config.name));

        debug!(scheduler = %inner.name, "queue scheduler started");
        Ok(Self { inner })
    }

    fn enqueue(&self, job: Job) {
        if self.inner.jobs.send(job).is_err() {
            warn!(scheduler = %self.inner.name, "worker has exited; dropping job");
        }
    }
}

fn run_worker(inner: Weak<QueueInner>, mut receiver: UnboundedReceiver<Job>, name: String) {
    debug!(scheduler = %name, "worker started");

    while let Some(job) = receiver.blocking_recv() {
        if job.cancel.is_disposed() {
            continue;
        }

        let action = job.action;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match inner.upgrade() {
            Some(inner) => CurrentScheduler::run_as(Arc::new(QueueScheduler { inner }), action),
            None => action(),
        }));
        if outcome.is_err() {
            error!(scheduler = %name, "scheduled action panicked");
        }
    }

    debug!(scheduler = %name, "worker stopped");
}

impl Scheduler for QueueScheduler {
    fn id(&self) -> SchedulerId {
        self.inner.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn schedule(&self, action: Action) -> Disposable {
        let cancel = Disposable::empty();
        self.enqueue(Job {
            action,
            cancel: cancel.clone(),
        });
        cancel
    }

    fn schedule_after(&self, delay: Duration, action: Action) -> Disposable {
        self.inner.timers.insert(delay, action)
    }
}

impl std::fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}
