use super::core::TaskCore;
use super::partition::blocks;
use super::result::{Completion, ResultTask};
use super::status::TaskKind;
use crate::error::{BoxError, TaskError};
use crate::substrate::SubstrateHandle;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

/// Runs the same factory `size` times concurrently and collects the
/// results in a deterministic order.
///
/// All `size` child [`ResultTask`]s start at construction. They are
/// arranged in blocks of `split` for bookkeeping only; the blocks do not
/// change when or how the children run.
///
/// The batch's own unit of work does nothing. Aggregation happens inside
/// [`get`](Self::get), which walks the blocks in order and the children of
/// each block in insertion order. A failed child contributes its
/// (transformed) empty result instead of aborting the collection.
///
/// # Examples
///
/// ```rust,ignore
/// let batch = BatchResultTask::of(&substrate, 5, 2, || Ok(42));
///
/// assert_eq!(batch.get(), vec![Some(42); 5]);
/// assert_eq!(batch.groups(), &[0..2, 2..4, 4..5]);
/// ```
pub struct BatchResultTask<R> {
    core: Arc<TaskCore>,
    children: Vec<ResultTask<R>>,
    groups: Vec<Range<usize>>,
}

impl<R> BatchResultTask<R>
where
    R: Send + 'static,
{
    /// Starts `size` independent invocations of `factory`, grouped in
    /// blocks of `split`.
    ///
    /// # Panics
    ///
    /// Panics if `split == 0`.
    pub fn of<F>(substrate: &SubstrateHandle, size: usize, split: usize, factory: F) -> Self
    where
        F: Fn() -> Result<R, BoxError> + Send + Sync + 'static,
    {
        let groups = blocks(size, split);
        let factory = Arc::new(factory);

        let core = TaskCore::new(TaskKind::BatchResult, substrate);
        let children = (0..size)
            .map(|_| {
                let factory = factory.clone();
                ResultTask::of(substrate, move || factory())
            })
            .collect();

        debug!(task = %core.id(), size, split, groups = groups.len(), "replicas started");
        core.start(substrate, || {});

        Self {
            core,
            children,
            groups,
        }
    }

    /// Sets the completion transform of every child.
    pub fn with_completion<T>(mut self, transform: T) -> Self
    where
        T: Fn(Option<R>) -> Option<R> + Send + Sync + 'static,
    {
        let transform: Completion<R> = Arc::new(transform);

        self.children = self
            .children
            .into_iter()
            .map(|child| child.with_shared_completion(transform.clone()))
            .collect();
        self
    }

    /// Registers `handler` on every child.
    ///
    /// Children that already failed invoke it right away.
    pub fn with_child_error_handler<H>(self, handler: H) -> Self
    where
        H: Fn(&TaskError) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);

        for child in &self.children {
            let handler = handler.clone();
            child.set_error_handler(move |err| handler(err));
        }
        self
    }
}

impl<R> BatchResultTask<R>
where
    R: Clone + Send + 'static,
{
    /// Blocks on every child and returns their results.
    ///
    /// The order is block order, then insertion order within a block,
    /// regardless of the order in which children actually finished.
    pub fn get(&self) -> Vec<Option<R>> {
        let mut results = Vec::with_capacity(self.children.len());

        for group in &self.groups {
            for child in &self.children[group.clone()] {
                results.push(child.get());
            }
        }

        self.core.mark_done();
        results
    }
}

impl<R> BatchResultTask<R> {
    /// Returns the bookkeeping blocks as index ranges into
    /// [`children`](Self::children).
    pub fn groups(&self) -> &[Range<usize>] {
        &self.groups
    }

    /// Returns the number of replicas.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if the batch was created with `size == 0`.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the replicas in insertion order.
    pub fn children(&self) -> &[ResultTask<R>] {
        &self.children
    }

    lifecycle_methods!();
}

impl<R> fmt::Debug for BatchResultTask<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchResultTask")
            .field("id", &self.core.id())
            .field("status", &self.core.status())
            .field("size", &self.children.len())
            .field("groups", &self.groups)
            .finish()
    }
}
