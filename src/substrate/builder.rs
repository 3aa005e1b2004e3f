use super::Substrate;

use std::time::Duration;

/// Settings captured by [`SubstrateBuilder`].
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Prefix for unit thread names; the unit id is appended.
    pub(crate) thread_name_prefix: String,

    /// Stack size for unit threads, platform default when `None`.
    pub(crate) stack_size: Option<usize>,

    /// How often a blocked waiter re-checks its own interrupt flag.
    pub(crate) wait_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_name_prefix: String::from("taskline"),
            stack_size: None,
            wait_interval: Duration::from_millis(1),
        }
    }
}

/// Builder for configuring and creating a [`Substrate`].
///
/// # Examples
///
/// ```rust,ignore
/// let substrate = SubstrateBuilder::new()
///     .thread_name_prefix("ingest")
///     .wait_interval(Duration::from_millis(5))
///     .build();
/// ```
pub struct SubstrateBuilder {
    config: Config,
}

impl SubstrateBuilder {
    /// Creates a builder with default settings: threads named
    /// `taskline-<unit>`, platform stack size and a 1ms wait interval.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Sets the prefix used to name unit threads.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the stack size, in bytes, of unit threads.
    ///
    /// # Panics
    ///
    /// Panics if `bytes == 0`.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        assert!(bytes > 0, "stack_size must be > 0");

        self.config.stack_size = Some(bytes);
        self
    }

    /// Sets how often a thread blocked in `get()`/`wait()` re-checks
    /// whether its own unit has been interrupted.
    ///
    /// This bounds the latency of a wait failure, not of completion:
    /// completion wakes waiters directly.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn wait_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "wait_interval must be > 0");

        self.config.wait_interval = interval;
        self
    }

    /// Builds the substrate. No thread is started until work is submitted.
    pub fn build(self) -> Substrate {
        Substrate::new(self.config)
    }
}

impl Default for SubstrateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let builder = SubstrateBuilder::new()
            .thread_name_prefix("ingest")
            .stack_size(256 * 1024)
            .wait_interval(Duration::from_millis(7));

        assert_eq!(builder.config.thread_name_prefix, "ingest");
        assert_eq!(builder.config.stack_size, Some(256 * 1024));
        assert_eq!(builder.config.wait_interval, Duration::from_millis(7));
    }

    #[test]
    #[should_panic(expected = "wait_interval must be > 0")]
    fn test_zero_wait_interval_panics() {
        let _ = SubstrateBuilder::new().wait_interval(Duration::ZERO);
    }
}
