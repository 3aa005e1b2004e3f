//! Example: Cancelling a running result task

use std::thread;
use std::time::{Duration, Instant};

use taskline::{ResultTask, SubstrateBuilder};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskline=debug".into()))
        .init();

    let substrate = SubstrateBuilder::new().build();

    // A factory that checks for cancellation on every iteration
    let task = ResultTask::of(&substrate, || {
        for i in 1..=10 {
            println!("Running {i}");
            taskline::sleep(Duration::from_millis(100))?;
        }
        Ok("Result")
    })
    .with_error_handler(|err| println!("Caught: {err}"));

    thread::sleep(Duration::from_millis(300));
    task.cancel();

    println!("Result: {:?} ({})", task.get(), task.status());

    // Warm path: many short-lived tasks in sequence
    let count = 100;
    let start = Instant::now();
    for _ in 0..count {
        let task = ResultTask::of(&substrate, || Ok("Result"));
        let _ = task.get();
    }
    println!("{count} tasks took {} ms", start.elapsed().as_millis());
}
