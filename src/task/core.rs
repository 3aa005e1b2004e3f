use super::status::{TaskId, TaskKind, TaskStatus};
use crate::error::{BoxError, Interrupted, TaskError};
use crate::substrate::context::current_unit;
use crate::substrate::{SubstrateHandle, UnitHandle};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace, warn};

/// Callback invoked with the captured error when a task fails.
pub(crate) type ErrorHandler = Arc<dyn Fn(&TaskError) + Send + Sync>;

/// What a single `cancel()` call achieved.
#[derive(Debug, Clone)]
pub(crate) enum CancelOutcome {
    /// The interrupt was delivered and the task moved to `Cancelled`.
    Cancelled,

    /// The interrupt was delivered but the task had already settled.
    AlreadySettled(TaskStatus),

    /// The interrupt mechanism itself failed; the task captured the error.
    RequestFailed(Arc<TaskError>),
}

/// Mutable lifecycle state, guarded by `TaskCore::state`.
struct State {
    status: TaskStatus,

    /// Raised by `mark_done` and `cancel`; releases waiters.
    completed: bool,

    /// First captured failure.
    error: Option<Arc<TaskError>>,

    handler: Option<ErrorHandler>,

    /// Whether a handler has already been invoked for this task.
    handled: bool,
}

/// The lifecycle shared by every task variant.
///
/// A `TaskCore` owns the status state machine, the captured error, the
/// error handler and the handle of the execution unit running the task.
/// Variants wrap it with their own result storage and unit of work.
///
/// Terminal transitions are first-writer-wins: once `Done`, `Failed` or
/// `Cancelled` is reached the status never changes again, and the error
/// handler runs at most once.
pub(crate) struct TaskCore {
    id: TaskId,
    kind: TaskKind,

    /// Handle of the unit running this task. Exists before the unit's
    /// thread so early interrupts are kept.
    unit: Arc<UnitHandle>,

    /// How often a blocked waiter re-checks its own interrupt flag.
    wait_interval: Duration,

    state: Mutex<State>,

    /// Signalled when `completed` is raised.
    done: Condvar,
}

impl TaskCore {
    /// Creates a lifecycle in the `Running` state. Nothing runs until
    /// [`start`](Self::start) is called.
    pub(crate) fn new(kind: TaskKind, substrate: &SubstrateHandle) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            kind,
            unit: Arc::new(UnitHandle::new()),
            wait_interval: substrate.wait_interval(),
            state: Mutex::new(State {
                status: TaskStatus::Running,
                completed: false,
                error: None,
                handler: None,
                handled: false,
            }),
            done: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `body` on a new execution unit.
    ///
    /// `body` is skipped if the task settled before its unit got to run
    /// (e.g. it was cancelled right after construction). If the unit cannot
    /// be started the task fails with [`TaskError::Start`] and completes.
    pub(crate) fn start<F>(self: &Arc<Self>, substrate: &SubstrateHandle, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let core = self.clone();
        let started = substrate.run_unit(self.unit.clone(), move || {
            if core.status().is_terminal() {
                trace!(task = %core.id, "task settled before its unit ran");
                core.mark_done();
                return;
            }
            body();
        });

        match started {
            Ok(()) => {
                debug!(task = %self.id, kind = %self.kind, unit = %self.unit.id(), "task started");
            }
            Err(err) => {
                self.fail(TaskError::Start(err));
                self.mark_done();
            }
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn status(&self) -> TaskStatus {
        self.lock().status
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.lock().completed
    }

    pub(crate) fn error(&self) -> Option<Arc<TaskError>> {
        self.lock().error.clone()
    }

    /// Records `err` and moves to `Failed`.
    pub(crate) fn fail(&self, err: TaskError) -> bool {
        self.fail_shared(Arc::new(err))
    }

    /// Records an already shared error and moves to `Failed`.
    ///
    /// Ignored if the task already reached a terminal state. On the
    /// transition the registered handler, if any, is invoked once, outside
    /// the state lock. Returns whether the transition took effect.
    ///
    /// Does not raise `completed`; the caller finishes with `mark_done`.
    pub(crate) fn fail_shared(&self, err: Arc<TaskError>) -> bool {
        let handler = {
            let mut state = self.lock();

            if !state.status.transition(TaskStatus::Failed) {
                debug!(task = %self.id, status = %state.status, error = %err, "late failure ignored");
                return false;
            }

            state.error = Some(err.clone());

            let handler = state.handler.clone();
            if handler.is_some() {
                state.handled = true;
            }
            handler
        };

        warn!(task = %self.id, kind = %self.kind, error = %err, "task failed");

        if let Some(handler) = handler {
            self.invoke(&handler, &err);
        }

        true
    }

    /// Raises `completed` and moves to `Done` unless another terminal state
    /// was reached first.
    pub(crate) fn mark_done(&self) {
        let mut state = self.lock();

        state.status.transition(TaskStatus::Done);
        if !state.completed {
            state.completed = true;
            debug!(task = %self.id, kind = %self.kind, status = %state.status, "task completed");
        }

        self.done.notify_all();
    }

    /// Requests interruption of the task's unit.
    ///
    /// A delivered request moves the task to `Cancelled` and completes it.
    /// If the interrupt mechanism fails, its error is captured through the
    /// failure path instead and the task still completes. The running unit
    /// is not forced to stop.
    pub(crate) fn cancel(&self) -> CancelOutcome {
        match self.unit.interrupt() {
            Ok(()) => {
                let mut state = self.lock();
                let cancelled = state.status.transition(TaskStatus::Cancelled);
                state.completed = true;
                self.done.notify_all();

                if cancelled {
                    debug!(task = %self.id, kind = %self.kind, "task cancelled");
                    CancelOutcome::Cancelled
                } else {
                    CancelOutcome::AlreadySettled(state.status)
                }
            }
            Err(err) => {
                let err = Arc::new(TaskError::CancellationRequest(err));
                self.fail_shared(err.clone());
                self.mark_done();
                CancelOutcome::RequestFailed(err)
            }
        }
    }

    /// Replaces the error handler.
    ///
    /// If the task already failed and no handler has run yet, `handler` is
    /// invoked right away with the captured error.
    pub(crate) fn set_error_handler(&self, handler: ErrorHandler) {
        let replay = {
            let mut state = self.lock();
            state.handler = Some(handler.clone());

            match (&state.error, state.status, state.handled) {
                (Some(err), TaskStatus::Failed, false) => {
                    let err = err.clone();
                    state.handled = true;
                    Some(err)
                }
                _ => None,
            }
        };

        if let Some(err) = replay {
            self.invoke(&handler, &err);
        }
    }

    /// Runs a handler, keeping a panicking handler from unwinding into the
    /// lifecycle.
    fn invoke(&self, handler: &ErrorHandler, err: &TaskError) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(err))) {
            warn!(task = %self.id, panic = %panic_message(payload.as_ref()), "error handler panicked");
        }
    }

    /// Blocks until `completed` is raised.
    ///
    /// Wakes directly on this task's completion. When called from inside
    /// an execution unit, the caller's own interrupt flag is re-checked
    /// every `wait_interval`; an interrupted caller gets
    /// `TaskError::Wait(Interrupted)`.
    pub(crate) fn wait(&self) -> Result<(), TaskError> {
        let caller = current_unit();
        let mut state = self.lock();

        while !state.completed {
            state = match &caller {
                Some(unit) => {
                    if unit.is_interrupted() {
                        return Err(TaskError::Wait(Interrupted));
                    }

                    trace!(task = %self.id, waiter = %unit.id(), "waiting for completion");
                    self.done
                        .wait_timeout(state, self.wait_interval)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .done
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }

        Ok(())
    }

    /// Waits for completion; a failed wait is captured on this task, which
    /// is then force-completed. Never returns an error.
    pub(crate) fn block(&self) {
        if let Err(err) = self.wait() {
            self.fail(err);
            self.mark_done();
        }
    }
}

/// Runs a unit of work, turning both returned errors and panics into a
/// [`TaskError`].
pub(crate) fn guarded<T>(work: impl FnOnce() -> Result<T, BoxError>) -> Result<T, TaskError> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TaskError::Execution(err)),
        Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}
