use crate::error::SubstrateError;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::Thread;

/// Identifier of an execution unit, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value of this id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Where the execution unit is in its life.
enum UnitState {
    /// Created, thread not yet running.
    Pending,

    /// The unit's thread is running; kept for unparking.
    Running(Thread),

    /// The unit of work returned (or unwound).
    Finished,

    /// The unit could never be started.
    Detached,
}

/// Handle to one concurrent execution unit.
///
/// The handle exists before the unit's thread is spawned, so an interrupt
/// requested early is never lost: the flag is sticky and the unit observes
/// it as soon as it checks.
///
/// Interruption is cooperative. [`interrupt`](Self::interrupt) raises a
/// flag and unparks the unit's thread; code running inside the unit
/// observes it through [`checkpoint`](crate::checkpoint),
/// [`sleep`](crate::sleep) or [`is_interrupted`](crate::is_interrupted).
pub struct UnitHandle {
    id: UnitId,
    interrupted: AtomicBool,
    state: Mutex<UnitState>,
}

impl UnitHandle {
    pub(crate) fn new() -> Self {
        Self {
            id: UnitId::next(),
            interrupted: AtomicBool::new(false),
            state: Mutex::new(UnitState::Pending),
        }
    }

    /// Returns the id of this unit.
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Requests best-effort interruption of the unit.
    ///
    /// Succeeds for pending, running and finished units. Fails with
    /// [`SubstrateError::Detached`] when the unit could never be started,
    /// since there is nothing left to deliver the request to.
    pub fn interrupt(&self) -> Result<(), SubstrateError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let UnitState::Detached = *state {
            return Err(SubstrateError::Detached(self.id));
        }

        self.interrupted.store(true, Ordering::Release);

        if let UnitState::Running(thread) = &*state {
            thread.unpark();
        }

        Ok(())
    }

    /// Returns `true` once an interrupt has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Returns `true` once the unit of work has returned.
    pub fn is_finished(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            UnitState::Finished
        )
    }

    /// Records the thread now running this unit.
    pub(crate) fn attach(&self, thread: Thread) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = UnitState::Running(thread);
    }

    pub(crate) fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = UnitState::Finished;
    }

    /// Marks the unit as never started.
    pub(crate) fn detach(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = UnitState::Detached;
    }
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandle")
            .field("id", &self.id)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
