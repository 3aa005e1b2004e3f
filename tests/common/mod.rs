use std::time::{Duration, Instant};

use taskline::{Substrate, SubstrateBuilder};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once per test binary.
///
/// Output is controlled by `RUST_LOG`, e.g. `RUST_LOG=taskline=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn substrate() -> Substrate {
    init_tracing();
    SubstrateBuilder::new().thread_name_prefix("test").build()
}

/// Polls `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    condition()
}
