mod common;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use taskline::{Interrupted, SubstrateBuilder, SubstrateError};

#[test]
fn test_await_idle_reports_quiescence() {
    let substrate = common::substrate();

    substrate
        .run(|| thread::sleep(Duration::from_millis(100)))
        .unwrap();

    assert!(!substrate.await_idle(Duration::from_millis(10)));
    assert!(substrate.await_idle(Duration::from_secs(5)));
    assert_eq!(substrate.active_units(), 0);
}

#[test]
fn test_units_run_on_named_threads() {
    common::init_tracing();
    let substrate = SubstrateBuilder::new().thread_name_prefix("ingest").build();
    let (tx, rx) = mpsc::channel();

    let unit = substrate
        .run(move || {
            let name = thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        })
        .unwrap();

    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name, Some(format!("ingest-{}", unit.id().as_u64())));
}

#[test]
fn test_interrupt_wakes_sleeping_unit() {
    let substrate = common::substrate();
    let (tx, rx) = mpsc::channel();

    let unit = substrate
        .run(move || {
            let started = Instant::now();
            let outcome = taskline::sleep(Duration::from_secs(10));
            tx.send((outcome, started.elapsed())).unwrap();
        })
        .unwrap();

    thread::sleep(Duration::from_millis(20));
    unit.interrupt().unwrap();

    let (outcome, elapsed) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, Err(Interrupted));
    assert!(elapsed < Duration::from_secs(5));
    assert!(unit.is_interrupted());
}

#[test]
fn test_shutdown_rejects_new_work() {
    let substrate = common::substrate();

    substrate
        .run(|| thread::sleep(Duration::from_millis(20)))
        .unwrap();
    substrate.shutdown();

    assert!(substrate.is_shutdown());
    assert!(substrate.await_termination(Duration::from_secs(1)));
    assert!(matches!(
        substrate.run(|| {}),
        Err(SubstrateError::ShutDown)
    ));
}

#[test]
fn test_handle_observes_shutdown() {
    let substrate = common::substrate();
    let handle = substrate.handle();

    assert!(!handle.await_termination(Duration::from_millis(1)));

    drop(substrate);

    assert!(handle.is_shutdown());
    assert!(handle.await_termination(Duration::from_secs(1)));
    assert!(matches!(handle.run(|| {}), Err(SubstrateError::ShutDown)));
}

#[test]
fn test_shutdown_now_interrupts_running_units() {
    let substrate = common::substrate();
    let (tx, rx) = mpsc::channel();

    substrate
        .run(move || {
            tx.send(taskline::sleep(Duration::from_secs(30))).unwrap();
        })
        .unwrap();

    thread::sleep(Duration::from_millis(20));
    let started = Instant::now();
    substrate.shutdown_now();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(rx.recv().unwrap(), Err(Interrupted));
    assert_eq!(substrate.active_units(), 0);
}

#[test]
#[should_panic(expected = "wait_interval must be > 0")]
fn test_zero_wait_interval_panics() {
    let _ = SubstrateBuilder::new().wait_interval(Duration::ZERO);
}
