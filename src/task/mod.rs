//! Task primitives.
//!
//! Every task shares one lifecycle (see [`TaskStatus`]) and differs only
//! in the shape of the work it holds:
//! - [`ResultTask`] produces a value,
//! - [`ActionTask`] consumes an input,
//! - [`BatchActionTask`] fans an action out over groups of inputs and
//!   cancels the remaining groups on the first failure,
//! - [`BatchResultTask`] replicates a factory and collects the results in
//!   a deterministic order.
//!
//! Tasks start their work eagerly, at construction. Blocking accessors
//! (`get`, `wait`) never raise: failures are observed through
//! [`TaskStatus`], the captured error or an error handler.

/// Lifecycle accessors shared by every task type.
///
/// Expands inside an `impl` block of a type holding `core: Arc<TaskCore>`.
macro_rules! lifecycle_methods {
    () => {
        /// Returns the process-unique id of this task.
        pub fn id(&self) -> $crate::task::TaskId {
            self.core.id()
        }

        /// Returns which task variant this is.
        pub fn kind(&self) -> $crate::task::TaskKind {
            self.core.kind()
        }

        /// Returns the current lifecycle state.
        pub fn status(&self) -> $crate::task::TaskStatus {
            self.core.status()
        }

        /// Returns `true` once waiters have been released.
        pub fn is_completed(&self) -> bool {
            self.core.is_completed()
        }

        /// Returns the captured failure, if any.
        pub fn error(&self) -> Option<::std::sync::Arc<$crate::error::TaskError>> {
            self.core.error()
        }

        /// Requests best-effort cancellation.
        ///
        /// The running unit is interrupted and the task moves to
        /// `Cancelled`, unless it already settled. If the interrupt itself
        /// fails, the task fails with
        /// [`TaskError::CancellationRequest`](crate::TaskError::CancellationRequest).
        /// Either way waiters are released. The unit of work only stops at
        /// its next cooperative checkpoint.
        pub fn cancel(&self) {
            self.core.cancel();
        }

        /// Replaces the error handler.
        ///
        /// The handler is invoked once, with the captured error, when the
        /// task fails. If the task already failed and no handler ran yet,
        /// it is invoked immediately.
        pub fn set_error_handler<H>(&self, handler: H)
        where
            H: Fn(&$crate::error::TaskError) + Send + Sync + 'static,
        {
            self.core.set_error_handler(::std::sync::Arc::new(handler));
        }

        /// Chainable form of [`set_error_handler`](Self::set_error_handler).
        pub fn with_error_handler<H>(self, handler: H) -> Self
        where
            H: Fn(&$crate::error::TaskError) + Send + Sync + 'static,
        {
            self.set_error_handler(handler);
            self
        }

        /// Registers an error handler that only fires for errors of type `E`.
        ///
        /// The handler receives the error carried by the captured
        /// [`TaskError`](crate::TaskError), see
        /// [`TaskError::downcast_ref`](crate::TaskError::downcast_ref). It
        /// replaces any previous handler and is consumed by the first
        /// failure even when that failure is of another type.
        ///
        /// # Examples
        ///
        /// ```rust,ignore
        /// let task = ResultTask::of(&substrate, || fetch())
        ///     .with_error_handler_for::<Interrupted, _>(|_| eprintln!("fetch interrupted"));
        /// ```
        pub fn with_error_handler_for<E, H>(self, handler: H) -> Self
        where
            E: ::std::error::Error + 'static,
            H: Fn(&E) + Send + Sync + 'static,
        {
            self.set_error_handler(move |err: &$crate::error::TaskError| {
                if let Some(err) = err.downcast_ref::<E>() {
                    handler(err);
                }
            });
            self
        }
    };
}

mod action;
mod batch_action;
mod batch_result;
mod core;
mod partition;
mod result;
mod status;

pub use action::ActionTask;
pub use batch_action::{BatchActionBuilder, BatchActionTask, CancellationReport};
pub use batch_result::BatchResultTask;
pub use partition::PartialGroup;
pub use result::ResultTask;
pub use status::{TaskId, TaskKind, TaskStatus};
