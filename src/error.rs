//! Error types.
//!
//! Every failure a task can observe funnels into [`TaskError`]. The
//! substrate reports its own failures through [`SubstrateError`], and units
//! of work that honour an interrupt surface [`Interrupted`].

use crate::substrate::UnitId;

use std::io;

/// Boxed error returned by user supplied units of work.
///
/// Closures passed to the task constructors return `Result<_, BoxError>`,
/// so any error type can be propagated with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The coarse failure taxonomy a [`TaskError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The unit of work itself raised (or could not be started).
    Execution,

    /// The interrupt mechanism failed while honouring `cancel()`.
    CancellationRequest,

    /// Blocking on a task's completion failed.
    Wait,
}

/// Error captured by a task when it transitions to `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("unit of work failed: {0}")]
    Execution(#[source] BoxError),

    #[error("unit of work panicked: {0}")]
    Panicked(String),

    #[error("unit of work could not be started: {0}")]
    Start(#[source] SubstrateError),

    #[error("cancellation request failed: {0}")]
    CancellationRequest(#[source] SubstrateError),

    #[error("waiting for completion failed: {0}")]
    Wait(#[source] Interrupted),
}

impl TaskError {
    /// Returns the failure category of this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TaskError::Execution(_) | TaskError::Panicked(_) | TaskError::Start(_) => {
                FailureKind::Execution
            }
            TaskError::CancellationRequest(_) => FailureKind::CancellationRequest,
            TaskError::Wait(_) => FailureKind::Wait,
        }
    }

    /// Returns the underlying error as an `E`, if it is one.
    ///
    /// Looks through the variant to the error it carries: the source of
    /// `Execution`, the substrate error of `Start` and
    /// `CancellationRequest`, or the [`Interrupted`] of `Wait`. A panic
    /// carries no error value and never matches.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            TaskError::Execution(source) => source.downcast_ref::<E>(),
            TaskError::Panicked(_) => None,
            TaskError::Start(err) | TaskError::CancellationRequest(err) => {
                (err as &(dyn std::error::Error + 'static)).downcast_ref::<E>()
            }
            TaskError::Wait(err) => (err as &(dyn std::error::Error + 'static)).downcast_ref::<E>(),
        }
    }

    /// Returns `true` if the unit of work stopped because it observed an
    /// interrupt and propagated [`Interrupted`].
    pub fn is_interrupted(&self) -> bool {
        match self {
            TaskError::Execution(source) => source.is::<Interrupted>(),
            TaskError::Wait(_) => true,
            _ => false,
        }
    }
}

/// Errors reported by the execution substrate.
#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    #[error("substrate is shut down")]
    ShutDown,

    #[error("failed to spawn execution unit: {0}")]
    Spawn(#[from] io::Error),

    #[error("execution unit {0} is detached and cannot be interrupted")]
    Detached(UnitId),
}

/// Returned by [`checkpoint`](crate::checkpoint) and [`sleep`](crate::sleep)
/// once the current execution unit has been asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("execution unit was interrupted")]
pub struct Interrupted;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let exec = TaskError::Execution("boom".into());
        assert_eq!(exec.failure_kind(), FailureKind::Execution);
        assert_eq!(
            TaskError::Panicked("boom".into()).failure_kind(),
            FailureKind::Execution
        );
        assert_eq!(
            TaskError::Start(SubstrateError::ShutDown).failure_kind(),
            FailureKind::Execution
        );
        assert_eq!(
            TaskError::CancellationRequest(SubstrateError::ShutDown).failure_kind(),
            FailureKind::CancellationRequest
        );
        assert_eq!(
            TaskError::Wait(Interrupted).failure_kind(),
            FailureKind::Wait
        );
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_downcast_looks_through_variants() {
        let exec = TaskError::Execution(Box::new(DiskFull));
        assert!(exec.downcast_ref::<DiskFull>().is_some());
        assert!(exec.downcast_ref::<Interrupted>().is_none());

        let wait = TaskError::Wait(Interrupted);
        assert_eq!(wait.downcast_ref::<Interrupted>(), Some(&Interrupted));

        let start = TaskError::Start(SubstrateError::ShutDown);
        assert!(matches!(
            start.downcast_ref::<SubstrateError>(),
            Some(SubstrateError::ShutDown)
        ));

        assert!(TaskError::Panicked("boom".into()).downcast_ref::<DiskFull>().is_none());
    }

    #[test]
    fn test_interrupted_detection() {
        assert!(TaskError::Execution(Box::new(Interrupted)).is_interrupted());
        assert!(!TaskError::Execution("boom".into()).is_interrupted());
        assert!(TaskError::Wait(Interrupted).is_interrupted());
    }
}
