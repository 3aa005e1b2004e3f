//! Task lifecycle states.
//!
//! ```text
//! Running -> Done | Failed | Cancelled
//! Done/Failed/Cancelled -> (terminal, no further transitions)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observable lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The unit of work has been started and no terminal transition
    /// happened yet.
    Running,

    /// The task finished without a recorded failure.
    Done,

    /// A failure was captured.
    Failed,

    /// The task was cancelled before any other terminal transition.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` for `Done`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Running)
    }

    /// Applies a transition if it is legal.
    ///
    /// Only `Running` may move, and only to a terminal state. Returns
    /// whether the transition took effect; the first terminal writer wins.
    pub(crate) fn transition(&mut self, to: TaskStatus) -> bool {
        if self.is_terminal() || !to.is_terminal() {
            return false;
        }

        *self = to;
        true
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Which task variant a lifecycle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Single-result future, see [`ResultTask`](crate::ResultTask).
    Result,

    /// Fire-and-forget action, see [`ActionTask`](crate::ActionTask).
    Action,

    /// Chunked fan-out of an action, see
    /// [`BatchActionTask`](crate::BatchActionTask).
    BatchAction,

    /// Replicated factory, see [`BatchResultTask`](crate::BatchResultTask).
    BatchResult,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Result => "result",
            TaskKind::Action => "action",
            TaskKind::BatchAction => "batch-action",
            TaskKind::BatchResult => "batch-result",
        };
        f.write_str(s)
    }
}

/// Identifier of a task, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value of this id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
