//! # Batch Scheduler
//!
//! Fans out one generation task per eligible slide onto the tokio runtime,
//! lets the [`ConcurrencyGate`](super::concurrency_gate::ConcurrencyGate)
//! bound provider calls, and collects outcomes until every task reports or
//! the aggregate deadline (`items × per_item_timeout`) elapses.
//!
//! On expiry the batch cancellation token fires and the remaining tasks are
//! detached rather than aborted: tasks waiting for a permit or sleeping
//! between attempts exit promptly, while a provider call already in flight
//! is allowed to finish. Nothing they produce afterwards is collected, and an
//! outcome that only surfaces once the deadline has passed is treated as
//! late. A task that panics is recorded as an aborted failure.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::{error_codes, messages};
use crate::models::{BatchPolicy, FailureKind, ItemOutcome, WorkItem};
use crate::orchestration::generation_task::GenerationTask;
use crate::orchestration::progress_tracker::ProgressTracker;
use crate::orchestration::result_aggregator::ResultAggregator;
use crate::state_machine::BatchEvent;

/// How a scheduling pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleExit {
    /// Every task produced an outcome
    AllReported,
    /// Deadline elapsed; these items never reported
    DeadlineElapsed { pending: Vec<Uuid> },
}

impl ScheduleExit {
    pub fn event(&self) -> BatchEvent {
        match self {
            Self::AllReported => BatchEvent::Finish,
            Self::DeadlineElapsed { .. } => BatchEvent::DeadlineElapsed,
        }
    }
}

pub struct BatchScheduler {
    task: GenerationTask,
    policy: BatchPolicy,
}

impl BatchScheduler {
    pub fn new(task: GenerationTask, policy: BatchPolicy) -> Self {
        Self { task, policy }
    }

    /// Run every item, feeding outcomes to the tracker and aggregator as they
    /// arrive.
    #[instrument(skip_all, fields(batch_id = %batch_id, item_count = items.len()))]
    pub async fn run(
        &self,
        batch_id: Uuid,
        items: Vec<WorkItem>,
        tracker: &ProgressTracker,
        aggregator: &mut ResultAggregator,
    ) -> ScheduleExit {
        let deadline_after = self.policy.aggregate_deadline(items.len());
        let deadline = deadline_from(Instant::now(), deadline_after);
        let cancel = CancellationToken::new();

        info!(
            batch_id = %batch_id,
            items = items.len(),
            max_concurrent = self.policy.max_concurrent,
            deadline_ms = deadline_after.as_millis(),
            "Scheduling generation tasks"
        );

        let mut join_set: JoinSet<ItemOutcome> = JoinSet::new();
        for item in items {
            let task = self.task.clone();
            let token = cancel.clone();
            join_set.spawn(async move {
                let item_id = item.item_id;
                match AssertUnwindSafe(task.run(item, token)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        error!(
                            batch_id = %batch_id,
                            item_id = %item_id,
                            error_code = error_codes::TASK_ABORTED,
                            panic_msg = %panic_message(&*panic),
                            "Generation task panicked"
                        );
                        ItemOutcome::failed(item_id, FailureKind::Aborted, messages::TASK_ABORTED, 0)
                    }
                }
            });
        }

        loop {
            let next = tokio::time::timeout_at(deadline, join_set.join_next()).await;
            match next {
                Ok(Some(Ok(outcome))) if Instant::now() < deadline => {
                    tracker.record(&outcome);
                    aggregator.record(outcome);
                }
                Ok(Some(Ok(late))) => {
                    debug!(
                        batch_id = %batch_id,
                        item_id = %late.item_id,
                        "Outcome arrived at the deadline and is not collected"
                    );
                    return self.abandon(batch_id, &mut join_set, &cancel, aggregator, deadline_after);
                }
                Ok(Some(Err(join_error))) => {
                    error!(
                        batch_id = %batch_id,
                        error = %join_error,
                        "Generation task terminated without an outcome"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    return self.abandon(batch_id, &mut join_set, &cancel, aggregator, deadline_after);
                }
            }
        }

        // A task cancelled by the runtime never reported; count it as failed so nothing is dropped
        for item_id in aggregator.pending() {
            error!(
                batch_id = %batch_id,
                item_id = %item_id,
                error_code = error_codes::TASK_ABORTED,
                "Recording aborted generation task as failed"
            );
            let outcome =
                ItemOutcome::failed(item_id, FailureKind::Aborted, messages::TASK_ABORTED, 0);
            tracker.record(&outcome);
            aggregator.record(outcome);
        }

        ScheduleExit::AllReported
    }

    fn abandon(
        &self,
        batch_id: Uuid,
        join_set: &mut JoinSet<ItemOutcome>,
        cancel: &CancellationToken,
        aggregator: &ResultAggregator,
        deadline_after: Duration,
    ) -> ScheduleExit {
        cancel.cancel();
        let still_running = join_set.len();
        join_set.detach_all();

        let pending = aggregator.pending();
        warn!(
            batch_id = %batch_id,
            pending = pending.len(),
            still_running = still_running,
            deadline_ms = deadline_after.as_millis(),
            "Batch deadline elapsed, abandoning outstanding tasks"
        );
        ScheduleExit::DeadlineElapsed { pending }
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }
}

/// Deadline `after` from `now`, saturating at a point no batch will reach
fn deadline_from(now: Instant, after: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
