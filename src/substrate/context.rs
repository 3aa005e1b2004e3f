use super::unit::UnitHandle;
use crate::error::Interrupted;

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

thread_local! {
    /// Thread-local handle to the execution unit running on this thread.
    ///
    /// Installed by the substrate for the duration of a unit of work so
    /// that code deep inside the unit can observe interrupts without
    /// passing the handle around.
    pub(crate) static CURRENT_UNIT: RefCell<Option<Arc<UnitHandle>>> =
        const { RefCell::new(None) };
}

/// Runs `f` with `unit` installed as the current execution unit.
///
/// The previous context is restored afterwards, even if `f` unwinds.
pub(crate) fn enter_context<R>(unit: Arc<UnitHandle>, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Arc<UnitHandle>>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let prev = self.0.take();
            CURRENT_UNIT.with(|cell| {
                cell.replace(prev);
            });
        }
    }

    let prev = CURRENT_UNIT.with(|cell| cell.replace(Some(unit)));
    let _restore = Restore(prev);

    f()
}

/// Returns the execution unit running on this thread, if any.
pub(crate) fn current_unit() -> Option<Arc<UnitHandle>> {
    CURRENT_UNIT.with(|cell| cell.borrow().clone())
}

/// Returns `true` if the current execution unit has been asked to stop.
///
/// Always `false` on threads that are not running a unit of work.
pub fn is_interrupted() -> bool {
    CURRENT_UNIT.with(|cell| {
        cell.borrow()
            .as_ref()
            .is_some_and(|unit| unit.is_interrupted())
    })
}

/// Cooperative cancellation point.
///
/// Returns `Err(Interrupted)` once the current execution unit has been
/// interrupted, so long running work can bail out with `?`.
///
/// # Examples
///
/// ```rust,ignore
/// for chunk in chunks {
///     taskline::checkpoint()?;
///     process(chunk);
/// }
/// ```
pub fn checkpoint() -> Result<(), Interrupted> {
    if is_interrupted() {
        Err(Interrupted)
    } else {
        Ok(())
    }
}

/// Blocks the current thread for `duration`, waking early on interrupt.
///
/// Inside an execution unit the sleep parks the thread and returns
/// `Err(Interrupted)` as soon as the unit is interrupted (immediately if
/// it already was). A duration too large to form a deadline, such as
/// `Duration::MAX`, sleeps until interrupted. Outside a unit this is a
/// plain sleep.
pub fn sleep(duration: Duration) -> Result<(), Interrupted> {
    let Some(unit) = current_unit() else {
        thread::sleep(duration);
        return Ok(());
    };

    let deadline = Instant::now().checked_add(duration);

    loop {
        if unit.is_interrupted() {
            return Err(Interrupted);
        }

        // Spurious wakeups are fine, the loop re-checks both conditions.
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(());
                }
                thread::park_timeout(deadline - now);
            }
            None => thread::park(),
        }
    }
}
