use super::core::{TaskCore, guarded};
use super::status::TaskKind;
use crate::error::BoxError;
use crate::substrate::SubstrateHandle;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Transform applied to the raw result slot on every `get()`.
pub(crate) type Completion<R> = Arc<dyn Fn(Option<R>) -> Option<R> + Send + Sync>;

/// A single-result future.
///
/// The factory starts running on its own execution unit as soon as the
/// task is constructed. [`get`](Self::get) blocks until the task completes
/// and returns the produced value passed through the completion transform.
///
/// Failures are not raised by `get`: if the factory fails (returns an
/// error or panics) the result slot stays empty and `get` returns the
/// transform of `None`. Inspect [`status`](Self::status),
/// [`error`](Self::error) or register an error handler to observe them.
///
/// # Examples
///
/// ```rust,ignore
/// let task = ResultTask::of(&substrate, || Ok(21))
///     .with_completion(|value| value.map(|v| v * 2));
///
/// assert_eq!(task.get(), Some(42));
/// assert_eq!(task.status(), TaskStatus::Done);
/// ```
pub struct ResultTask<R> {
    core: Arc<TaskCore>,

    /// Written once by the unit of work, before completion.
    slot: Arc<Mutex<Option<R>>>,

    /// Read lazily by `get`, so it can be configured after start.
    completion: Completion<R>,
}

impl<R> ResultTask<R>
where
    R: Send + 'static,
{
    /// Creates the task and starts `factory` immediately.
    pub fn of<F>(substrate: &SubstrateHandle, factory: F) -> Self
    where
        F: FnOnce() -> Result<R, BoxError> + Send + 'static,
    {
        let core = TaskCore::new(TaskKind::Result, substrate);
        let slot = Arc::new(Mutex::new(None));

        let unit_core = core.clone();
        let unit_slot = slot.clone();
        core.start(substrate, move || {
            match guarded(factory) {
                Ok(value) => {
                    *unit_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
                }
                Err(err) => {
                    unit_core.fail(err);
                }
            }
            // Completes on failure too, so `get` never hangs.
            unit_core.mark_done();
        });

        Self {
            core,
            slot,
            completion: Arc::new(|value| value),
        }
    }

    /// Sets the transform applied to the raw result on every `get()`.
    ///
    /// The transform receives `None` when the factory failed. It is
    /// applied once per `get()` call, always to the raw value.
    pub fn with_completion<T>(self, transform: T) -> Self
    where
        T: Fn(Option<R>) -> Option<R> + Send + Sync + 'static,
    {
        self.with_shared_completion(Arc::new(transform))
    }

    pub(crate) fn with_shared_completion(mut self, transform: Completion<R>) -> Self {
        self.completion = transform;
        self
    }

    lifecycle_methods!();
}

impl<R> ResultTask<R>
where
    R: Clone + Send + 'static,
{
    /// Blocks until the task completes and returns the transformed result.
    ///
    /// Returns whatever the completion transform makes of the raw slot,
    /// which is `None` if the factory failed or the task was cancelled
    /// before producing a value. If the wait itself fails, the failure is
    /// captured on this task and the task is force-completed.
    pub fn get(&self) -> Option<R> {
        self.core.block();

        let raw = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        (self.completion)(raw)
    }
}

impl<R> fmt::Debug for ResultTask<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultTask")
            .field("id", &self.core.id())
            .field("status", &self.core.status())
            .finish()
    }
}
