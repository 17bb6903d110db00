//! Current Scheduler
//!
//! Tracks which scheduler is executing on the current thread. Schedulers
//! that own an execution context enter themselves around every action they
//! run; nested code can then ask "where am I running?" and schedule follow-up
//! work onto the same context.
//!
//! # Implementation
//!
//! A thread-local stack of schedulers. Entering pushes onto the stack and
//! returns a guard; dropping the guard pops. Nesting happens naturally when
//! one scheduler runs work synchronously on behalf of another (for example,
//! a virtual scheduler driven from inside a queue scheduler's action).

use std::cell::RefCell;

use super::{SchedulerId, SchedulerRef};

thread_local! {
    static CURRENT_STACK: RefCell<Vec<SchedulerRef>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the current scheduler when dropped.
///
/// This keeps the stack balanced even if the scheduled action panics.
pub struct CurrentScheduler {
    scheduler_id: SchedulerId,
}

impl CurrentScheduler {
    /// Make `scheduler` the current scheduler of this thread until the
    /// returned guard is dropped.
    pub fn enter(scheduler: SchedulerRef) -> Self {
        let scheduler_id = scheduler.id();
        CURRENT_STACK.with(|stack| stack.borrow_mut().push(scheduler));
        Self { scheduler_id }
    }

    /// The innermost scheduler executing on this thread, if any.
    pub fn get() -> Option<SchedulerRef> {
        CURRENT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether any scheduler is executing on this thread.
    pub fn is_set() -> bool {
        CURRENT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Run `action` with `scheduler` as the current scheduler.
    pub fn run_as(scheduler: SchedulerRef, action: impl FnOnce()) {
        let _current = Self::enter(scheduler);
        action();
    }

    /// The scheduler this guard entered.
    pub fn scheduler_id(&self) -> SchedulerId {
        self.scheduler_id
    }
}

impl Drop for CurrentScheduler {
    fn drop(&mut self) {
        let popped = CURRENT_STACK.with(|stack| stack.borrow_mut().pop());

        // Guards must be dropped in reverse order of entry.
        if let Some(scheduler) = popped {
            debug_assert_eq!(
                scheduler.id(),
                self.scheduler_id,
                "CurrentScheduler mismatch: expected {:?}, got {:?}",
                self.scheduler_id,
                scheduler.id()
            );
        }
    }
}

impl std::fmt::Debug for CurrentScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentScheduler")
            .field("scheduler_id", &self.scheduler_id)
            .finish()
    }
}
