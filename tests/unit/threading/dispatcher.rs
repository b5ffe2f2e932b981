use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;

use super::*;

#[test]
fn access_checks_follow_the_owning_thread() {
    let dispatcher = RenderDispatcher::new();
    assert!(dispatcher.check_access());
    dispatcher.verify_access();

    let clone = dispatcher.clone();
    let off_thread = thread::spawn(move || clone.check_access()).join().unwrap();
    assert!(!off_thread);
}

#[test]
fn normal_work_runs_before_deferred_work() {
    let dispatcher = RenderDispatcher::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = Arc::clone(&order);
    dispatcher.dispatch(DispatchPriority::Low, move || o.lock().push("low"));
    let o = Arc::clone(&order);
    dispatcher.dispatch(DispatchPriority::Normal, move || o.lock().push("normal"));

    dispatcher.run_pending();
    assert_eq!(*order.lock(), vec!["normal", "low"]);
}

#[test]
fn cross_thread_dispatch_runs_on_the_owner() {
    let dispatcher = RenderDispatcher::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let clone = dispatcher.clone();
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        clone.dispatch(DispatchPriority::Normal, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    })
    .join()
    .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    dispatcher.run_pending();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn run_pending_panics_off_the_owner_thread() {
    let dispatcher = RenderDispatcher::new();
    let result = thread::spawn(move || dispatcher.run_pending()).join();
    assert!(result.is_err());
}

#[test]
fn jobs_queued_by_a_running_job_drain_in_the_same_pump() {
    let dispatcher = RenderDispatcher::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let requeue = dispatcher.clone();
    let counter = Arc::clone(&hits);
    dispatcher.dispatch(DispatchPriority::Normal, move || {
        let inner = Arc::clone(&counter);
        requeue.dispatch(DispatchPriority::Normal, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        counter.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.run_pending();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
