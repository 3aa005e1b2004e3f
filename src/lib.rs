//! # Taskline
//!
//! **Taskline** is a small task layer with future-style results and batched
//! fan-out, running on an explicitly owned, thread-backed execution
//! substrate.
//!
//! Every task starts its work eagerly, on its own execution unit, the moment
//! it is constructed. Callers later block on the task to observe its outcome.
//! Tasks share one lifecycle (`Running` then exactly one of `Done`, `Failed`
//! or `Cancelled`) and never raise from their blocking accessors: failures
//! are observed through the task status, the captured error, or an error
//! handler.
//!
//! - [`ResultTask`] wraps a factory producing a value,
//! - [`ActionTask`] wraps an action consuming one input,
//! - [`BatchActionTask`] splits inputs into fixed-size groups, runs the
//!   groups concurrently and cancels the remaining groups on the first
//!   failure,
//! - [`BatchResultTask`] replicates a factory and collects the results in a
//!   deterministic order.
//!
//! Cancellation is cooperative. Code running inside a task observes it
//! through [`checkpoint`], [`sleep`] and [`is_interrupted`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taskline::{BatchActionTask, ResultTask, SubstrateBuilder, TaskStatus};
//!
//! let substrate = SubstrateBuilder::new().build();
//!
//! let answer = ResultTask::of(&substrate, || Ok(6 * 7));
//! assert_eq!(answer.get(), Some(42));
//!
//! let batch = BatchActionTask::of(&substrate, 0..6, 2, |n| {
//!     taskline::sleep(std::time::Duration::from_millis(n))?;
//!     Ok(())
//! });
//! batch.wait();
//! assert_eq!(batch.status(), TaskStatus::Done);
//! ```
//!
//! ## Modules
//!
//! - [`substrate`]: the execution substrate and cooperative interruption
//! - [`task`]: task lifecycle and the task variants
//! - [`error`]: error types

pub mod error;
pub mod substrate;
pub mod task;

pub use error::{BoxError, FailureKind, Interrupted, SubstrateError, TaskError};
pub use substrate::{
    Substrate, SubstrateBuilder, SubstrateHandle, UnitHandle, UnitId, checkpoint, is_interrupted,
    sleep,
};
pub use task::{
    ActionTask, BatchActionBuilder, BatchActionTask, BatchResultTask, CancellationReport,
    PartialGroup, ResultTask, TaskId, TaskKind, TaskStatus,
};
