use super::core::{TaskCore, guarded};
use super::status::TaskKind;
use crate::error::{BoxError, TaskError};
use crate::substrate::SubstrateHandle;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A fire-and-forget action over a single input.
///
/// The input is captured at construction and the action starts running on
/// its own execution unit immediately. [`wait`](Self::wait) blocks until
/// the task completes, whatever the outcome.
///
/// # Examples
///
/// ```rust,ignore
/// let task = ActionTask::of(&substrate, path, |path| {
///     std::fs::remove_file(path)?;
///     Ok(())
/// })
/// .with_error_handler(|err| eprintln!("cleanup failed: {err}"));
///
/// task.wait();
/// ```
pub struct ActionTask<I> {
    core: Arc<TaskCore>,
    _input: PhantomData<fn(I)>,
}

impl<I> ActionTask<I>
where
    I: Send + 'static,
{
    /// Creates the task and starts `action(input)` immediately.
    pub fn of<A>(substrate: &SubstrateHandle, input: I, action: A) -> Self
    where
        A: FnOnce(I) -> Result<(), BoxError> + Send + 'static,
    {
        let core = TaskCore::new(TaskKind::Action, substrate);

        Self::launch(core, substrate, move || {
            guarded(move || action(input)).map_err(Arc::new)
        })
    }

    /// Starts `body` on an already created lifecycle.
    ///
    /// An error returned by `body` is captured as-is, so a caller can
    /// share one error between several tasks.
    pub(crate) fn launch<B>(core: Arc<TaskCore>, substrate: &SubstrateHandle, body: B) -> Self
    where
        B: FnOnce() -> Result<(), Arc<TaskError>> + Send + 'static,
    {
        let unit_core = core.clone();
        core.start(substrate, move || {
            if let Err(err) = body() {
                unit_core.fail_shared(err);
            }
            unit_core.mark_done();
        });

        Self {
            core,
            _input: PhantomData,
        }
    }
}

impl<I> ActionTask<I> {
    /// Blocks until the task completes.
    ///
    /// Returns once the task is done, failed or cancelled. If the wait
    /// itself fails, the failure is captured on this task and the task is
    /// force-completed.
    pub fn wait(&self) {
        self.core.block();
    }

    lifecycle_methods!();
}

impl<I> fmt::Debug for ActionTask<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTask")
            .field("id", &self.core.id())
            .field("status", &self.core.status())
            .finish()
    }
}
