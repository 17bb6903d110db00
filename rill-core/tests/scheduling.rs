//! Scheduling Tests
//!
//! These tests run signals across real worker threads: queue schedulers,
//! delivery hops, timeouts and shared production.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rill_core::scheduler::{self, CurrentScheduler, QueueScheduler, SchedulerConfig};
use rill_core::{SchedulerRef, Signal, SignalError};

const WAIT: Duration = Duration::from_secs(5);

fn queue(name: &str) -> SchedulerRef {
    Arc::new(QueueScheduler::new(SchedulerConfig::named(name)).expect("worker thread"))
}

/// Test that a queue runs its actions one at a time, in order, as current.
#[test]
fn queue_runs_actions_serially_and_in_order() {
    let worker = queue("test.serial");
    let (tx, rx) = mpsc::channel();

    for i in 0..20 {
        let tx = tx.clone();
        let id = worker.id();
        worker.schedule(Box::new(move || {
            let current = scheduler::current().map(|s| s.id());
            let _ = tx.send((i, current == Some(id)));
        }));
    }

    let received: Vec<_> = (0..20).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(received.iter().map(|(i, _)| *i).collect::<Vec<_>>(), (0..20).collect::<Vec<_>>());
    assert!(received.iter().all(|(_, current)| *current));
}

/// Test that subscription without a current scheduler happens off-thread.
#[test]
fn subscription_without_current_scheduler_is_asynchronous() {
    assert!(!CurrentScheduler::is_set());
    let (tx, rx) = mpsc::channel();
    let caller = thread::current().id();

    let _subscription = Signal::just(1).subscribe_next(move |value| {
        let _ = tx.send((value, thread::current().id()));
    });

    let (value, thread_id) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(value, 1);
    assert_ne!(thread_id, caller);
}

/// Test that deliver_on hops every event onto the target queue.
#[test]
fn deliver_on_sends_events_on_the_target_queue() {
    let target = queue("test.deliver");
    let (tx, rx) = mpsc::channel();

    let values_tx = tx.clone();
    let _subscription = Signal::from_values(vec![1, 2, 3])
        .deliver_on(target.clone())
        .subscribe_next_completed(
            move |value| {
                let name = thread::current().name().map(str::to_owned);
                let _ = values_tx.send(Some((value, name)));
            },
            move || {
                let _ = tx.send(None);
            },
        );

    let mut values = Vec::new();
    while let Some(event) = rx.recv_timeout(WAIT).unwrap() {
        values.push(event);
    }

    assert_eq!(values.iter().map(|(v, _)| *v).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(values
        .iter()
        .all(|(_, name)| name.as_deref() == Some("test.deliver")));
}

/// Test that a silent signal times out with a timeout error.
#[test]
fn timeout_fails_a_silent_signal() {
    let (tx, rx) = mpsc::channel();

    let _subscription = Signal::<i32>::never()
        .timeout(Duration::from_millis(20), queue("test.timeout"))
        .subscribe_error(move |error| {
            let _ = tx.send(error);
        });

    let error: SignalError = rx.recv_timeout(WAIT).unwrap();
    assert!(error.is_timeout());
}

/// Test that a signal finishing in time is not cut off.
#[test]
fn timeout_lets_a_quick_signal_complete() {
    let (tx, rx) = mpsc::channel();

    let error_tx = tx.clone();
    let _subscription = Signal::just(5)
        .timeout(Duration::from_secs(30), queue("test.timeout.quick"))
        .subscribe_next_error_completed(
            |_| {},
            move |_| {
                let _ = error_tx.send("error");
            },
            move || {
                let _ = tx.send("completed");
            },
        );

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "completed");
}

/// Test that eager production runs once and is shared.
#[test]
fn eager_start_shares_one_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let signal = Signal::<&str>::start_eagerly(queue("test.eager"), move |subscriber| {
        counter.fetch_add(1, Ordering::SeqCst);
        subscriber.send_next("ready");
        subscriber.send_completed();
    });

    for _ in 0..3 {
        let (tx, rx) = mpsc::channel();
        let _subscription = signal.subscribe_next_completed(
            {
                let tx = tx.clone();
                move |value| {
                    let _ = tx.send(Some(value));
                }
            },
            move || {
                let _ = tx.send(None);
            },
        );
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some("ready"));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Test that a queue's delayed action waits at least the delay.
#[test]
fn delayed_values_arrive_after_the_delay() {
    let (tx, rx) = mpsc::channel();
    let started = std::time::Instant::now();

    let _subscription = Signal::just(9)
        .delay(Duration::from_millis(30), queue("test.delay"))
        .subscribe_next(move |value| {
            let _ = tx.send(value);
        });

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 9);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

/// Test that delayed values keep their order and precede completion.
#[test]
fn delayed_values_keep_their_order_on_a_queue() {
    let (tx, rx) = mpsc::channel();

    let values_tx = tx.clone();
    let _subscription = Signal::from_values(vec![1, 2, 3])
        .delay(Duration::from_millis(30), queue("test.delay.many"))
        .subscribe_next_completed(
            move |value| {
                let _ = values_tx.send(Some(value));
            },
            move || {
                let _ = tx.send(None);
            },
        );

    let mut values = Vec::new();
    while let Some(value) = rx.recv_timeout(WAIT).unwrap() {
        values.push(value);
    }
    assert_eq!(values, vec![1, 2, 3]);
}
