use super::action::ActionTask;
use super::core::{CancelOutcome, ErrorHandler, TaskCore, guarded};
use super::partition::{PartialGroup, chunk};
use super::status::TaskKind;
use crate::error::{BoxError, TaskError};
use crate::substrate::{SubstrateHandle, is_interrupted};

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

/// Callback receiving the outcome of a cascading cancellation sweep.
type CancellationHook = Arc<dyn Fn(&CancellationReport) + Send + Sync>;

/// Outcome of the sweep that runs when a group fails.
///
/// Cancelling a sibling is best effort: a sibling whose interrupt could not
/// be delivered is recorded here and the sweep moves on.
#[derive(Debug, Clone)]
pub struct CancellationReport {
    /// Index of the group whose action failed.
    pub failed_group: usize,

    /// Number of sibling groups the sweep tried to cancel.
    pub attempted: usize,

    /// Siblings moved to `Cancelled` by the sweep.
    pub cancelled: usize,

    /// Siblings that had already settled.
    pub already_finished: usize,

    /// Errors raised while interrupting siblings.
    pub request_failures: Vec<Arc<TaskError>>,
}

/// Builder configuring a [`BatchActionTask`] before it starts.
///
/// # Examples
///
/// ```rust,ignore
/// let batch = BatchActionBuilder::new(100)
///     .partial_group(PartialGroup::Emit)
///     .error_handler(|err| eprintln!("batch failed: {err}"))
///     .on_cancellation(|report| eprintln!("cancelled {} groups", report.cancelled))
///     .spawn(&substrate, rows, |row| store(row));
///
/// batch.wait();
/// ```
pub struct BatchActionBuilder {
    split: usize,
    partial_group: PartialGroup,
    error_handler: Option<ErrorHandler>,
    on_cancellation: Option<CancellationHook>,
}

impl BatchActionBuilder {
    /// Creates a builder for groups of `split` elements.
    ///
    /// # Panics
    ///
    /// Panics if `split == 0`.
    pub fn new(split: usize) -> Self {
        assert!(split > 0, "split must be > 0");

        Self {
            split,
            partial_group: PartialGroup::default(),
            error_handler: None,
            on_cancellation: None,
        }
    }

    /// Chooses what happens to trailing inputs that do not fill a group.
    /// Defaults to [`PartialGroup::Drop`].
    pub fn partial_group(mut self, policy: PartialGroup) -> Self {
        self.partial_group = policy;
        self
    }

    /// Registers the batch's error handler before any group runs.
    pub fn error_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&TaskError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Registers a hook receiving every cascading cancellation report.
    pub fn on_cancellation<H>(mut self, hook: H) -> Self
    where
        H: Fn(&CancellationReport) + Send + Sync + 'static,
    {
        self.on_cancellation = Some(Arc::new(hook));
        self
    }

    /// Partitions `inputs` and starts one action task per group.
    pub fn spawn<I, A>(
        self,
        substrate: &SubstrateHandle,
        inputs: impl IntoIterator<Item = I>,
        action: A,
    ) -> BatchActionTask<I>
    where
        I: Send + 'static,
        A: Fn(I) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let (groups, dropped) = chunk(inputs, self.split, self.partial_group);

        let core = TaskCore::new(TaskKind::BatchAction, substrate);
        if let Some(handler) = self.error_handler {
            core.set_error_handler(handler);
        }

        let group_sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        debug!(
            task = %core.id(),
            groups = group_sizes.len(),
            split = self.split,
            dropped,
            "inputs partitioned"
        );

        // Every child lifecycle exists before any group runs, so a failing
        // group always sees the full sibling list.
        let siblings: Arc<[Arc<TaskCore>]> = groups
            .iter()
            .map(|_| TaskCore::new(TaskKind::Action, substrate))
            .collect();
        let report = Arc::new(OnceLock::new());
        let action = Arc::new(action);

        let children: Vec<ActionTask<Vec<I>>> = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| {
                let sweep = Sweep {
                    parent: core.clone(),
                    siblings: siblings.clone(),
                    index,
                    report: report.clone(),
                    hook: self.on_cancellation.clone(),
                };
                let action = action.clone();

                ActionTask::launch(siblings[index].clone(), substrate, move || {
                    run_group(group, action.as_ref(), &sweep)
                })
            })
            .collect();

        let parent = core.clone();
        core.start(substrate, move || {
            // Observed in group order; wall-clock time is bounded by the
            // slowest group since all of them already run.
            for child in siblings.iter() {
                if child.wait().is_err() {
                    debug!(task = %parent.id(), "batch stopped waiting after interrupt");
                    break;
                }
            }
            parent.mark_done();
        });

        BatchActionTask {
            core,
            children,
            group_sizes,
            dropped,
            report,
        }
    }
}

/// Cascading cancellation state handed to every group.
struct Sweep {
    parent: Arc<TaskCore>,
    siblings: Arc<[Arc<TaskCore>]>,
    index: usize,
    report: Arc<OnceLock<CancellationReport>>,
    hook: Option<CancellationHook>,
}

impl Sweep {
    /// Fails the parent, cancels every other group, then completes the
    /// parent.
    fn run(&self, err: Arc<TaskError>) {
        self.parent.fail_shared(err);

        let mut report = CancellationReport {
            failed_group: self.index,
            attempted: 0,
            cancelled: 0,
            already_finished: 0,
            request_failures: Vec::new(),
        };

        for (index, sibling) in self.siblings.iter().enumerate() {
            if index == self.index {
                continue;
            }

            report.attempted += 1;
            match sibling.cancel() {
                CancelOutcome::Cancelled => report.cancelled += 1,
                CancelOutcome::AlreadySettled(status) => {
                    debug!(group = index, %status, "sibling already settled");
                    report.already_finished += 1;
                }
                CancelOutcome::RequestFailed(err) => report.request_failures.push(err),
            }
        }

        warn!(
            task = %self.parent.id(),
            group = self.index,
            attempted = report.attempted,
            cancelled = report.cancelled,
            already_finished = report.already_finished,
            request_failures = report.request_failures.len(),
            "cascading cancellation after group failure"
        );

        if let Some(hook) = &self.hook {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(&report))).is_err() {
                warn!(task = %self.parent.id(), "cancellation hook panicked");
            }
        }

        // Concurrent failures each sweep; the first report is kept.
        let _ = self.report.set(report);

        self.parent.mark_done();
    }
}

/// Applies `action` to each element of `group` in order.
///
/// Stops quietly before the next element once the group's unit has been
/// interrupted, or when an element fails after the interrupt. On the first
/// genuine failure the cascading sweep runs and the error is returned so
/// this group fails with it as well.
fn run_group<I, A>(group: Vec<I>, action: &A, sweep: &Sweep) -> Result<(), Arc<TaskError>>
where
    A: Fn(I) -> Result<(), BoxError>,
{
    for (position, item) in group.into_iter().enumerate() {
        if is_interrupted() {
            debug!(group = sweep.index, position, "group stopped at checkpoint");
            return Ok(());
        }

        if let Err(err) = guarded(|| action(item)) {
            // A cancelled group unwinding out of an interrupted element is
            // not a new failure.
            if is_interrupted() {
                debug!(group = sweep.index, position, error = %err, "group interrupted mid-element");
                return Ok(());
            }

            let err = Arc::new(err);
            sweep.run(err.clone());
            return Err(err);
        }
    }

    Ok(())
}

/// Fans an action out over fixed-size groups of inputs.
///
/// Inputs are chunked into groups of `split` elements in encounter order.
/// One [`ActionTask`] per group starts at construction; groups run
/// concurrently while the elements of a group are processed sequentially.
/// By default a trailing partial group is dropped, see
/// [`PartialGroup`].
///
/// If an element's action fails, the batch fails with that error and every
/// other group is cancelled (best effort: a group stops before its next
/// element). The failing group itself ends `Failed`.
///
/// # Examples
///
/// ```rust,ignore
/// let batch = BatchActionTask::of(&substrate, 0..7, 3, |n| {
///     println!("{n}");
///     Ok(())
/// });
///
/// batch.wait();
/// assert_eq!(batch.group_sizes(), &[3, 3]);
/// assert_eq!(batch.dropped(), 1);
/// ```
pub struct BatchActionTask<I> {
    core: Arc<TaskCore>,
    children: Vec<ActionTask<Vec<I>>>,
    group_sizes: Vec<usize>,
    dropped: usize,
    report: Arc<OnceLock<CancellationReport>>,
}

impl<I> BatchActionTask<I>
where
    I: Send + 'static,
{
    /// Partitions `inputs` into groups of `split` and starts every group
    /// immediately, with default settings. Use [`BatchActionBuilder`] to
    /// configure the batch before it starts.
    ///
    /// # Panics
    ///
    /// Panics if `split == 0`.
    pub fn of<A>(
        substrate: &SubstrateHandle,
        inputs: impl IntoIterator<Item = I>,
        split: usize,
        action: A,
    ) -> Self
    where
        A: Fn(I) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        BatchActionBuilder::new(split).spawn(substrate, inputs, action)
    }
}

impl<I> BatchActionTask<I> {
    /// Blocks until the batch completes.
    ///
    /// Returns after every group has been waited on in group order, or as
    /// soon as the batch is completed by a failing group.
    pub fn wait(&self) {
        self.core.block();
    }

    /// Returns the number of elements in each group, in group order.
    pub fn group_sizes(&self) -> &[usize] {
        &self.group_sizes
    }

    /// Returns the number of groups.
    pub fn group_count(&self) -> usize {
        self.group_sizes.len()
    }

    /// Returns how many trailing inputs were dropped by partitioning.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns the per-group tasks, in group order.
    pub fn children(&self) -> &[ActionTask<Vec<I>>] {
        &self.children
    }

    /// Returns the report of the first cascading cancellation, if any
    /// group failed.
    pub fn cancellation_report(&self) -> Option<&CancellationReport> {
        self.report.get()
    }

    lifecycle_methods!();
}

impl<I> fmt::Debug for BatchActionTask<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchActionTask")
            .field("id", &self.core.id())
            .field("status", &self.core.status())
            .field("groups", &self.group_sizes)
            .field("dropped", &self.dropped)
            .finish()
    }
}
