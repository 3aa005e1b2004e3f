use super::builder::Config;
use super::context::enter_context;
use super::unit::UnitHandle;
use crate::error::SubstrateError;

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

/// State shared by the substrate and every clone of its handle.
struct Shared {
    config: Config,

    /// Number of units whose thread has been spawned and not yet exited.
    active: Mutex<usize>,

    /// Signalled whenever `active` drops to zero.
    idle: Condvar,

    /// Live units and the threads running them.
    units: Mutex<Vec<(Arc<UnitHandle>, JoinHandle<()>)>>,

    /// Set once shutdown has started; no new units are accepted.
    shutdown: AtomicBool,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, usize> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn units(&self) -> MutexGuard<'_, Vec<(Arc<UnitHandle>, JoinHandle<()>)>> {
        self.units.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut active = self.active();
        *active -= 1;

        if *active == 0 {
            self.idle.notify_all();
        }
    }
}

/// Releases a unit's bookkeeping when its thread exits, including by unwinding.
struct UnitGuard {
    unit: Arc<UnitHandle>,
    shared: Arc<Shared>,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!(unit = %self.unit.id(), "execution unit panicked");
        }

        self.unit.finish();
        self.shared.release();
    }
}

/// Cloneable handle to an execution substrate.
///
/// Tasks are started through a handle. A handle does not keep the
/// substrate alive: once the owning [`Substrate`] shuts down, starting
/// new units fails with [`SubstrateError::ShutDown`].
#[derive(Clone)]
pub struct SubstrateHandle {
    shared: Arc<Shared>,
}

impl SubstrateHandle {
    /// Starts `work` on a new execution unit immediately.
    ///
    /// Each call spawns one dedicated thread; units are never pooled or
    /// reused. The returned handle supports best-effort interruption.
    ///
    /// # Errors
    ///
    /// Fails if the substrate is shut down or the thread cannot be spawned.
    pub fn run<F>(&self, work: F) -> Result<Arc<UnitHandle>, SubstrateError>
    where
        F: FnOnce() + Send + 'static,
    {
        let unit = Arc::new(UnitHandle::new());
        self.run_unit(unit.clone(), work)?;
        Ok(unit)
    }

    /// Starts `work` on a new thread bound to an existing unit handle.
    ///
    /// On failure the handle is marked detached.
    pub(crate) fn run_unit<F>(&self, unit: Arc<UnitHandle>, work: F) -> Result<(), SubstrateError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.shutdown.load(Ordering::Acquire) {
            unit.detach();
            return Err(SubstrateError::ShutDown);
        }

        let config = &self.shared.config;
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, unit.id().as_u64()));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        *self.shared.active() += 1;

        let guard = UnitGuard {
            unit: unit.clone(),
            shared: self.shared.clone(),
        };
        let spawned = builder.spawn(move || {
            let guard = guard;
            guard.unit.attach(thread::current());
            enter_context(guard.unit.clone(), work);
        });

        match spawned {
            Ok(handle) => {
                let mut units = self.shared.units();
                units.retain(|(_, handle)| !handle.is_finished());
                units.push((unit, handle));
                Ok(())
            }
            Err(err) => {
                // The closure (and the guard inside it) was dropped by the
                // failed spawn, which already released the active count.
                unit.detach();
                warn!(error = %err, "failed to spawn execution unit");
                Err(SubstrateError::Spawn(err))
            }
        }
    }

    /// Blocks until no unit is running or `timeout` elapses.
    ///
    /// Returns `true` if the substrate was quiescent when the call returned.
    /// This is a coarse, shared signal and says nothing about any specific
    /// task.
    pub fn await_idle(&self, timeout: Duration) -> bool {
        let active = self.shared.active();
        let (active, _) = self
            .shared
            .idle
            .wait_timeout_while(active, timeout, |active| *active > 0)
            .unwrap_or_else(PoisonError::into_inner);

        *active == 0
    }

    /// Blocks until the substrate is shut down and quiescent, or `timeout`
    /// elapses. Returns `true` on termination.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.is_shutdown() && self.await_idle(timeout)
    }

    /// Returns the number of units currently running.
    pub fn active_units(&self) -> usize {
        *self.shared.active()
    }

    /// Returns `true` once shutdown has started.
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Interval at which blocked waiters re-check their own interrupt flag.
    pub(crate) fn wait_interval(&self) -> Duration {
        self.shared.config.wait_interval
    }
}

/// An explicitly owned execution substrate.
///
/// The substrate runs every unit of work on its own thread and tracks
/// them until they exit. It is created through
/// [`SubstrateBuilder`](super::SubstrateBuilder) and dereferences to a
/// [`SubstrateHandle`], so `&substrate` can be passed anywhere a handle is
/// expected.
///
/// Dropping the substrate shuts it down and joins every unit thread.
///
/// # Examples
///
/// ```rust,ignore
/// let substrate = SubstrateBuilder::new().build();
/// let task = ResultTask::of(&substrate, || Ok(21 * 2));
/// assert_eq!(task.get(), Some(42));
/// ```
pub struct Substrate {
    handle: SubstrateHandle,
}

impl Substrate {
    pub(crate) fn new(config: Config) -> Self {
        debug!(prefix = %config.thread_name_prefix, "substrate started");

        Self {
            handle: SubstrateHandle {
                shared: Arc::new(Shared {
                    config,
                    active: Mutex::new(0),
                    idle: Condvar::new(),
                    units: Mutex::new(Vec::new()),
                    shutdown: AtomicBool::new(false),
                }),
            },
        }
    }

    /// Returns a cloneable handle, e.g. to start tasks from inside a unit
    /// of work.
    pub fn handle(&self) -> SubstrateHandle {
        self.handle.clone()
    }

    /// Stops accepting new units and joins every running unit.
    ///
    /// Units are not interrupted; see [`shutdown_now`](Self::shutdown_now).
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if !self.handle.shared.shutdown.swap(true, Ordering::AcqRel) {
            debug!(active = self.handle.active_units(), "substrate shutting down");
        }

        self.join();
    }

    /// Interrupts every running unit, then shuts down.
    pub fn shutdown_now(&self) {
        self.handle.shared.shutdown.store(true, Ordering::Release);

        let units = self.handle.shared.units();
        let mut interrupted = 0;
        for (unit, handle) in units.iter() {
            if !handle.is_finished() && unit.interrupt().is_ok() {
                interrupted += 1;
            }
        }
        drop(units);

        debug!(interrupted, "substrate interrupted running units");
        self.shutdown();
    }

    /// Joins all unit threads, skipping the calling thread if it is one.
    fn join(&self) {
        let current = thread::current().id();
        let units: Vec<_> = self.handle.shared.units().drain(..).collect();

        for (unit, handle) in units {
            if handle.thread().id() == current {
                continue;
            }

            if handle.join().is_err() {
                debug!(unit = %unit.id(), "joined a unit that panicked");
            }
        }
    }
}

impl Deref for Substrate {
    type Target = SubstrateHandle;

    fn deref(&self) -> &SubstrateHandle {
        &self.handle
    }
}

impl Drop for Substrate {
    /// Shuts the substrate down and joins all unit threads.
    fn drop(&mut self) {
        self.shutdown();
    }
}
