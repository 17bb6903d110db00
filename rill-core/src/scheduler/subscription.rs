//! Subscription scheduler.
//!
//! Signals subscribe through this scheduler. Subscribing from inside a
//! scheduler keeps the work on that scheduler, synchronously; subscribing
//! from a plain thread hands the work to a private background queue.

use std::sync::OnceLock;
use std::time::Duration;

use super::{start_or_immediate, Action, CurrentScheduler, Scheduler, SchedulerConfig, SchedulerId, SchedulerRef};
use crate::disposable::Disposable;

/// Runs subscription work on the current scheduler, or in the background.
#[derive(Debug)]
pub struct SubscriptionScheduler {
    id: SchedulerId,
}

impl SubscriptionScheduler {
    /// Create a new subscription scheduler.
    ///
    /// Most code should use the shared [`subscription`](super::subscription)
    /// instance.
    pub fn new() -> Self {
        Self {
            id: SchedulerId::new(),
        }
    }

    fn background() -> SchedulerRef {
        static BACKGROUND: OnceLock<SchedulerRef> = OnceLock::new();
        BACKGROUND
            .get_or_init(|| start_or_immediate(SchedulerConfig::named("rill.subscription")))
            .clone()
    }
}

impl Default for SubscriptionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for SubscriptionScheduler {
    fn id(&self) -> SchedulerId {
        self.id
    }

    fn name(&self) -> &str {
        "rill.subscription"
    }

    fn schedule(&self, action: Action) -> Disposable {
        if CurrentScheduler::is_set() {
            action();
            return Disposable::empty();
        }
        Self::background().schedule(action)
    }

    fn schedule_after(&self, delay: Duration, action: Action) -> Disposable {
        CurrentScheduler::get()
            .unwrap_or_else(Self::background)
            .schedule_after(delay, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::VirtualScheduler;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};

    #[test]
    fn runs_inline_under_current_scheduler() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        CurrentScheduler::run_as(Arc::new(VirtualScheduler::new()), || {
            SubscriptionScheduler::new().schedule(Box::new(move || {
                ran_clone.store(true, Ordering::SeqCst);
            }));
            assert!(ran.load(Ordering::SeqCst));
        });
    }

    #[test]
    fn falls_back_to_background_queue() {
        let (tx, rx) = mpsc::channel();

        SubscriptionScheduler::new().schedule(Box::new(move || {
            let name = CurrentScheduler::get().map(|s| s.name().to_string());
            let _ = tx.send(name);
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("rill.subscription"));
    }

    #[test]
    fn delayed_work_uses_current_scheduler() {
        let virtual_time = VirtualScheduler::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        CurrentScheduler::run_as(Arc::new(virtual_time.clone()), || {
            SubscriptionScheduler::new().schedule_after(
                Duration::from_secs(1),
                Box::new(move || ran_clone.store(true, Ordering::SeqCst)),
            );
        });

        assert!(!ran.load(Ordering::SeqCst));
        virtual_time.advance_by(Duration::from_secs(1));
        assert!(ran.load(Ordering::SeqCst));
    }
}
