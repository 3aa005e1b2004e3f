mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use taskline::{BatchResultTask, TaskKind, TaskStatus};

#[test]
fn test_collects_every_replica() {
    let substrate = common::substrate();

    let batch = BatchResultTask::of(&substrate, 5, 2, || Ok(42));

    assert_eq!(batch.kind(), TaskKind::BatchResult);
    assert_eq!(batch.len(), 5);
    assert_eq!(batch.groups(), &[0..2, 2..4, 4..5]);
    assert_eq!(batch.status(), TaskStatus::Running);

    assert_eq!(batch.get(), vec![Some(42); 5]);
    assert_eq!(batch.status(), TaskStatus::Done);
}

/// Id of the unit running the calling replica, read from its thread name.
/// Unit ids are handed out in child order.
fn unit_id() -> Option<u64> {
    thread::current()
        .name()?
        .strip_prefix("test-")?
        .parse()
        .ok()
}

#[test]
fn test_results_follow_insertion_order() {
    const SIZE: usize = 4;

    let substrate = common::substrate();
    let arrived = Arc::new(Barrier::new(SIZE));
    let ids = Arc::new(Mutex::new(Vec::new()));
    let finished = Arc::new(Mutex::new(Vec::new()));

    let (barrier, unit_ids, completions) = (arrived.clone(), ids.clone(), finished.clone());
    let batch = BatchResultTask::of(&substrate, SIZE, 3, move || {
        let id = unit_id().ok_or("unnamed unit thread")?;
        unit_ids.lock().unwrap().push(id);
        barrier.wait();

        // Later children sleep less, so they finish first.
        let rank = unit_ids.lock().unwrap().iter().filter(|other| **other < id).count();
        taskline::sleep(Duration::from_millis(30 * (SIZE - rank) as u64))?;
        completions.lock().unwrap().push(rank);
        Ok(rank)
    });

    let results = batch.get();

    assert_eq!(results, vec![Some(0), Some(1), Some(2), Some(3)]);
    assert_eq!(*finished.lock().unwrap(), vec![3, 2, 1, 0]);
}

#[test]
fn test_failed_replica_contributes_empty_result() {
    let substrate = common::substrate();
    let calls = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let handler_calls = handled.clone();
    let batch = BatchResultTask::of(&substrate, 3, 3, move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err("first replica failed".into());
        }
        Ok("ok")
    })
    .with_child_error_handler(move |_| {
        handler_calls.fetch_add(1, Ordering::SeqCst);
    });

    let results = batch.get();

    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 2);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(batch.status(), TaskStatus::Done);

    let failed = batch
        .children()
        .iter()
        .filter(|child| child.status() == TaskStatus::Failed)
        .count();
    assert_eq!(failed, 1);
}

#[test]
fn test_completion_applies_to_every_replica() {
    let substrate = common::substrate();

    let batch = BatchResultTask::<i32>::of(&substrate, 3, 2, || Err("down".into()))
        .with_completion(|value| value.or(Some(0)));

    assert_eq!(batch.get(), vec![Some(0); 3]);
}

#[test]
fn test_zero_size_yields_empty_results() {
    let substrate = common::substrate();

    let batch = BatchResultTask::of(&substrate, 0, 2, || Ok(1));

    assert!(batch.is_empty());
    assert!(batch.groups().is_empty());
    assert_eq!(batch.get(), Vec::<Option<i32>>::new());
    assert_eq!(batch.status(), TaskStatus::Done);
}

#[test]
fn test_split_larger_than_size_forms_one_block() {
    let substrate = common::substrate();

    let batch = BatchResultTask::of(&substrate, 3, usize::MAX, || Ok('x'));

    assert_eq!(batch.groups(), &[0..3]);
    assert_eq!(batch.get(), vec![Some('x'); 3]);
}

#[test]
fn test_cancelled_batch_stays_cancelled_after_get() {
    let substrate = common::substrate();

    let batch = BatchResultTask::of(&substrate, 2, 1, || Ok(7));
    batch.cancel();

    assert_eq!(batch.get(), vec![Some(7); 2]);
    assert_eq!(batch.status(), TaskStatus::Cancelled);
}

#[test]
#[should_panic(expected = "split must be > 0")]
fn test_zero_split_panics() {
    let substrate = common::substrate();
    let _ = BatchResultTask::of(&substrate, 3, 0, || Ok(1));
}
