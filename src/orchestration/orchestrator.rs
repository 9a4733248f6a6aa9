//! # Batch Orchestrator
//!
//! Inbound surface of the crate. Validates a [`BatchRequest`], works out
//! which slides need a video, opens a progress status and hands the run to a
//! background task. Callers get the batch id back immediately and can poll
//! [`BatchOrchestrator::batch_state`] or await
//! [`BatchOrchestrator::wait_for_batch`].
//!
//! Each background run is supervised: if it dies before publishing a
//! terminal state, the supervisor finishes the batch as `aborted`, reports
//! it as failed to the progress sink and releases every waiter. Sink writes
//! at the end of a run are bounded by `progress.sink_timeout_ms`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let orchestrator = BatchOrchestrator::new(repository, provider, sink, Arc::new(config));
//! let request = orchestrator.default_request(presentation_id, params);
//! let batch_id = orchestrator.submit_batch(request).await?;
//! let summary = orchestrator.wait_for_batch(batch_id).await?;
//! println!("{}", summary.status_message());
//! ```

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::constants::error_codes;
use crate::error::{BatchError, Result};
use crate::logging::{log_batch_operation, log_error};
use crate::models::{BatchRequest, BatchSummary, ExistingArtifact, ProviderParams, WorkItem};
use crate::orchestration::batch_scheduler::{BatchScheduler, ScheduleExit};
use crate::orchestration::concurrency_gate::ConcurrencyGate;
use crate::orchestration::eligibility::{filter_eligible, Eligibility};
use crate::orchestration::generation_task::GenerationTask;
use crate::orchestration::progress_tracker::ProgressTracker;
use crate::orchestration::result_aggregator::{summarize, ResultAggregator, SummaryContext};
use crate::orchestration::types::{
    GenerationProvider, ProgressSink, RepositoryError, WorkItemRepository,
};
use crate::state_machine::{BatchEvent, BatchState, BatchStateMachine, TerminalStatus};

/// Registry entry for one submitted batch
#[derive(Debug)]
struct BatchRecord {
    target_id: Uuid,
    status_id: Uuid,
    state: watch::Sender<BatchState>,
    summary: Arc<RwLock<Option<BatchSummary>>>,
}

/// Everything the background run needs, resolved up front
struct PreparedBatch {
    request: BatchRequest,
    eligibility: Eligibility,
    status_id: Uuid,
    context: SummaryContext,
}

pub struct BatchOrchestrator {
    repository: Arc<dyn WorkItemRepository>,
    provider: Arc<dyn GenerationProvider>,
    sink: Arc<dyn ProgressSink>,
    config: Arc<OrchestratorConfig>,
    batches: Arc<DashMap<Uuid, BatchRecord>>,
}

impl BatchOrchestrator {
    pub fn new(
        repository: Arc<dyn WorkItemRepository>,
        provider: Arc<dyn GenerationProvider>,
        sink: Arc<dyn ProgressSink>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        Self {
            repository,
            provider,
            sink,
            config,
            batches: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Request for every slide of a target, with policy and flags from configuration
    pub fn default_request(&self, target_id: Uuid, params: ProviderParams) -> BatchRequest {
        let defaults = &self.config.batch;
        BatchRequest::new(target_id, params)
            .with_policy(defaults.policy())
            .with_regenerate_existing(defaults.regenerate_existing)
            .with_required_prerequisites(defaults.required_prerequisites.clone())
    }

    /// Start a batch and return its id without waiting for it to finish.
    ///
    /// Fails only for problems detected before any generation starts: an
    /// invalid request, an unknown target, or an unreachable repository or
    /// progress sink.
    #[instrument(skip(self, request), fields(target_id = %request.target_id))]
    pub async fn submit_batch(&self, request: BatchRequest) -> Result<Uuid> {
        request.validate()?;

        let eligibility = self.resolve_eligibility(&request).await?;
        let status_id = self
            .sink
            .create_status(request.target_id, &self.config.progress.status_kind)
            .await?;

        let batch_id = Uuid::new_v4();
        let (state_tx, _) = watch::channel(BatchState::Created);
        let summary = Arc::new(RwLock::new(None));
        self.batches.insert(
            batch_id,
            BatchRecord {
                target_id: request.target_id,
                status_id,
                state: state_tx.clone(),
                summary: summary.clone(),
            },
        );

        log_batch_operation(
            "submit",
            batch_id,
            request.target_id,
            "created",
            Some(&format!(
                "selected={} eligible={} skipped={}",
                eligibility.selected,
                eligibility.eligible.len(),
                eligibility.skipped_count()
            )),
        );

        let context = SummaryContext::new(
            batch_id,
            request.target_id,
            eligibility.selected,
            &eligibility.eligible,
            Utc::now(),
        );
        let sink_timeout = self.config.progress.sink_timeout();
        let guard = RunGuard {
            context: context.clone(),
            status_id,
            sink: self.sink.clone(),
            state: state_tx.clone(),
            summary: summary.clone(),
            sink_timeout,
        };
        let prepared = PreparedBatch {
            request,
            eligibility,
            status_id,
            context,
        };
        let run = BatchRun {
            provider: self.provider.clone(),
            sink: self.sink.clone(),
            state: state_tx,
            summary,
            sink_timeout,
        };
        let handle = tokio::spawn(run.execute(prepared));
        tokio::spawn(guard.supervise(handle));

        Ok(batch_id)
    }

    /// Number of slides a request would send to the provider. Read-only.
    #[instrument(skip(self, request))]
    pub async fn eligible_count(&self, target_id: Uuid, request: &BatchRequest) -> Result<usize> {
        let mut request = request.clone();
        request.target_id = target_id;
        let eligibility = self.resolve_eligibility(&request).await?;
        Ok(eligibility.eligible.len())
    }

    pub fn batch_state(&self, batch_id: Uuid) -> Option<BatchState> {
        self.batches
            .get(&batch_id)
            .map(|record| *record.state.borrow())
    }

    /// Terminal summary, once the batch has finished
    pub fn batch_summary(&self, batch_id: Uuid) -> Option<BatchSummary> {
        self.batches
            .get(&batch_id)
            .filter(|record| record.state.borrow().is_terminal())
            .and_then(|record| record.summary.read().clone())
    }

    pub fn batch_status_id(&self, batch_id: Uuid) -> Option<Uuid> {
        self.batches.get(&batch_id).map(|record| record.status_id)
    }

    /// Ids of every batch submitted for a target
    pub fn batches_for_target(&self, target_id: Uuid) -> Vec<Uuid> {
        self.batches
            .iter()
            .filter(|entry| entry.target_id == target_id)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Wait until the batch reaches a terminal state and return its summary
    pub async fn wait_for_batch(&self, batch_id: Uuid) -> Result<BatchSummary> {
        // Clone out of the map so no shard lock is held across the await
        let (mut state_rx, summary) = {
            let record = self
                .batches
                .get(&batch_id)
                .ok_or(BatchError::UnknownBatch(batch_id))?;
            (record.state.subscribe(), record.summary.clone())
        };

        // Sender lives in the registry, so the channel never closes under us
        let _ = state_rx.wait_for(|state| state.is_terminal()).await;

        let summary = summary.read().clone();
        summary.ok_or(BatchError::UnknownBatch(batch_id))
    }

    async fn resolve_eligibility(&self, request: &BatchRequest) -> Result<Eligibility> {
        let items = self
            .repository
            .list_items(request.target_id)
            .await
            .map_err(|error| match error {
                RepositoryError::TargetNotFound(id) => BatchError::TargetNotFound(id),
                other => BatchError::Repository(other),
            })?;

        let existing = self.existing_artifacts(&items, request).await?;
        let eligibility = filter_eligible(
            &items,
            &request.selection,
            &existing,
            request.regenerate_existing,
        );

        if !eligibility.unknown.is_empty() {
            warn!(
                target_id = %request.target_id,
                unknown = ?eligibility.unknown,
                "Selection references items that do not belong to the target"
            );
        }
        debug!(
            target_id = %request.target_id,
            selected = eligibility.selected,
            eligible = eligibility.eligible.len(),
            skipped = eligibility.skipped_count(),
            "Resolved eligible items"
        );

        Ok(eligibility)
    }

    async fn existing_artifacts(
        &self,
        items: &[WorkItem],
        request: &BatchRequest,
    ) -> Result<HashMap<Uuid, ExistingArtifact>> {
        // Regeneration ignores existing artifacts entirely
        if request.regenerate_existing || items.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = items.iter().map(|item| item.item_id).collect();
        Ok(self.repository.list_existing_artifacts(&ids, true).await?)
    }
}

/// Owned state for one background run
struct BatchRun {
    provider: Arc<dyn GenerationProvider>,
    sink: Arc<dyn ProgressSink>,
    state: watch::Sender<BatchState>,
    summary: Arc<RwLock<Option<BatchSummary>>>,
    sink_timeout: Duration,
}

impl BatchRun {
    #[instrument(skip_all, fields(batch_id = %prepared.context.batch_id))]
    async fn execute(self, prepared: PreparedBatch) {
        let PreparedBatch {
            request,
            eligibility,
            status_id,
            context,
        } = prepared;

        let batch_id = context.batch_id;
        let mut machine = BatchStateMachine::new(batch_id);
        self.advance(&mut machine, BatchEvent::Start);

        let skipped = eligibility.skipped_count();
        let eligible = eligibility.eligible;
        let tracker = ProgressTracker::new(
            self.sink.clone(),
            status_id,
            eligibility.selected,
            skipped,
        );
        tracker.publish();

        let summary = if eligible.is_empty() {
            info!(batch_id = %batch_id, "No eligible slides, completing immediately");
            self.advance(&mut machine, BatchEvent::Finish);
            ResultAggregator::empty_summary(&context)
        } else {
            let task = GenerationTask::new(
                self.provider.clone(),
                ConcurrencyGate::new(request.policy.max_concurrent),
                request.params.clone(),
                request.required_prerequisites.clone(),
                request.policy,
            );
            let scheduler = BatchScheduler::new(task, request.policy);
            let mut aggregator = ResultAggregator::new(context);

            let exit = scheduler
                .run(batch_id, eligible, &tracker, &mut aggregator)
                .await;
            if let ScheduleExit::DeadlineElapsed { pending } = &exit {
                warn!(
                    batch_id = %batch_id,
                    not_completed = pending.len(),
                    "Batch timed out with items outstanding"
                );
            }
            let state = self.advance(&mut machine, exit.event());
            aggregator.finalize(state, Utc::now())
        };

        tracker.close(self.sink_timeout).await;

        // Stored before reporting so a failure while reporting keeps the result
        *self.summary.write() = Some(summary.clone());
        report_terminal_status(self.sink.as_ref(), status_id, &summary, self.sink_timeout).await;

        log_batch_operation(
            "finish",
            batch_id,
            summary.target_id,
            &summary.state.to_string(),
            Some(&summary.status_message()),
        );
        self.state.send_replace(machine.current_state());
    }

    fn advance(&self, machine: &mut BatchStateMachine, event: BatchEvent) -> BatchState {
        match machine.transition(event) {
            Ok(state) => {
                if !state.is_terminal() {
                    self.state.send_replace(state);
                }
                state
            }
            Err(transition_error) => {
                error!(error = %transition_error, "Rejected batch state transition");
                machine.current_state()
            }
        }
    }
}

/// Watches a background run and finishes the batch if the run dies first
struct RunGuard {
    context: SummaryContext,
    status_id: Uuid,
    sink: Arc<dyn ProgressSink>,
    state: watch::Sender<BatchState>,
    summary: Arc<RwLock<Option<BatchSummary>>>,
    sink_timeout: Duration,
}

impl RunGuard {
    async fn supervise(self, run: JoinHandle<()>) {
        let join_error = match run.await {
            Ok(()) => return,
            Err(join_error) => join_error,
        };
        let batch_id = self.context.batch_id;
        error!(
            batch_id = %batch_id,
            error_code = error_codes::BATCH_RUN_ABORTED,
            error = %join_error,
            "Batch run stopped before publishing a terminal state"
        );

        let stored = self.summary.read().clone();
        let summary = match stored {
            // The run finished the batch and failed while reporting it
            Some(summary) => summary,
            None => {
                let current = *self.state.borrow();
                let mut machine = BatchStateMachine::resume(batch_id, current);
                let state = match machine.transition(BatchEvent::Abort) {
                    Ok(state) => state,
                    Err(transition_error) => {
                        error!(error = %transition_error, "Rejected batch state transition");
                        return;
                    }
                };
                let summary = summarize(
                    &self.context,
                    &[],
                    state,
                    &self.context.work_order,
                    Utc::now(),
                );
                *self.summary.write() = Some(summary.clone());
                summary
            }
        };

        // The sink may be what failed, so report from a separate task
        let sink = self.sink.clone();
        let status_id = self.status_id;
        let sink_timeout = self.sink_timeout;
        let report = summary.clone();
        let reported = tokio::spawn(async move {
            report_terminal_status(sink.as_ref(), status_id, &report, sink_timeout).await;
        })
        .await;
        if let Err(report_error) = reported {
            log_error(
                "batch_orchestrator",
                "update_status",
                &report_error.to_string(),
                Some(&format!("status_id={status_id}")),
            );
        }

        log_batch_operation(
            "abort",
            batch_id,
            summary.target_id,
            &summary.state.to_string(),
            Some(&summary.status_message()),
        );
        self.state.send_replace(summary.state);
    }
}

/// Terminal status and message pushed to the sink for a finished batch
fn terminal_report(summary: &BatchSummary) -> (TerminalStatus, String) {
    let message = summary.status_message();
    match summary.state {
        BatchState::TimedOut => (TerminalStatus::Failed, format!("timed out: {message}")),
        BatchState::Aborted => (TerminalStatus::Failed, format!("aborted: {message}")),
        _ => (TerminalStatus::Completed, message),
    }
}

async fn report_terminal_status(
    sink: &dyn ProgressSink,
    status_id: Uuid,
    summary: &BatchSummary,
    sink_timeout: Duration,
) {
    let (status, message) = terminal_report(summary);
    let failure = match tokio::time::timeout(
        sink_timeout,
        sink.update_status(status_id, status, &message),
    )
    .await
    {
        Ok(Ok(())) => return,
        Ok(Err(sink_error)) => sink_error.to_string(),
        Err(_) => format!(
            "progress sink did not answer within {}ms",
            sink_timeout.as_millis()
        ),
    };
    log_error(
        "batch_orchestrator",
        "update_status",
        &failure,
        Some(&format!("status_id={status_id}")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Prerequisite, PrerequisiteKind};
    use crate::test_helpers::{InMemoryRepository, RecordingProgressSink, ScriptedProvider};

    fn slide(number: u32) -> WorkItem {
        WorkItem::new(number).with_prerequisite(Prerequisite::active(
            PrerequisiteKind::Audio,
            format!("audio/{number}.mp3"),
        ))
    }

    fn params() -> ProviderParams {
        ProviderParams {
            variant_id: "presenter-a".to_string(),
            ..Default::default()
        }
    }

    fn orchestrator(
        repository: Arc<InMemoryRepository>,
        provider: Arc<ScriptedProvider>,
        sink: Arc<RecordingProgressSink>,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(
            repository,
            provider,
            sink,
            Arc::new(OrchestratorConfig::default()),
        )
    }

    fn guard_for(
        sink: Arc<RecordingProgressSink>,
        status_id: Uuid,
        items: &[WorkItem],
    ) -> (RunGuard, watch::Receiver<BatchState>, Arc<RwLock<Option<BatchSummary>>>) {
        let context = SummaryContext::new(Uuid::new_v4(), Uuid::new_v4(), items.len(), items, Utc::now());
        let (state, state_rx) = watch::channel(BatchState::Running);
        let summary = Arc::new(RwLock::new(None));
        let guard = RunGuard {
            context,
            status_id,
            sink,
            state,
            summary: summary.clone(),
            sink_timeout: Duration::from_secs(1),
        };
        (guard, state_rx, summary)
    }

    #[tokio::test]
    async fn test_unknown_target_is_rejected_before_status_creation() {
        let sink = Arc::new(RecordingProgressSink::new());
        let orchestrator = orchestrator(
            Arc::new(InMemoryRepository::new()),
            Arc::new(ScriptedProvider::new()),
            sink.clone(),
        );

        let target_id = Uuid::new_v4();
        let result = orchestrator
            .submit_batch(orchestrator.default_request(target_id, params()))
            .await;

        assert!(matches!(result, Err(BatchError::TargetNotFound(id)) if id == target_id));
        assert_eq!(sink.status_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let target_id = Uuid::new_v4();
        let repository = Arc::new(InMemoryRepository::new().with_target(target_id, vec![slide(1)]));
        let orchestrator = orchestrator(
            repository,
            Arc::new(ScriptedProvider::new()),
            Arc::new(RecordingProgressSink::new()),
        );

        let request = orchestrator.default_request(target_id, ProviderParams::default());
        let result = orchestrator.submit_batch(request).await;
        assert!(matches!(result, Err(BatchError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_zero_eligible_completes_immediately() {
        let target_id = Uuid::new_v4();
        let items = vec![slide(1), slide(2)];
        let repository = Arc::new(
            InMemoryRepository::new()
                .with_target(target_id, items.clone())
                .with_completed_artifact(&items[0])
                .with_completed_artifact(&items[1]),
        );
        let provider = Arc::new(ScriptedProvider::new());
        let sink = Arc::new(RecordingProgressSink::new());
        let orchestrator = orchestrator(repository, provider.clone(), sink.clone());

        let batch_id = orchestrator
            .submit_batch(orchestrator.default_request(target_id, params()))
            .await
            .unwrap();
        let summary = orchestrator.wait_for_batch(batch_id).await.unwrap();

        assert_eq!(summary.state, BatchState::Completed);
        assert_eq!(summary.initiated, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.started_at, summary.ended_at);
        assert_eq!(provider.total_calls(), 0);

        let status_id = orchestrator.batch_status_id(batch_id).unwrap();
        let (status, _) = sink.final_status(status_id).unwrap();
        assert_eq!(status, TerminalStatus::Completed);
    }

    #[tokio::test]
    async fn test_wait_for_unknown_batch() {
        let orchestrator = orchestrator(
            Arc::new(InMemoryRepository::new()),
            Arc::new(ScriptedProvider::new()),
            Arc::new(RecordingProgressSink::new()),
        );
        let missing = Uuid::new_v4();
        assert!(orchestrator.batch_state(missing).is_none());
        assert!(matches!(
            orchestrator.wait_for_batch(missing).await,
            Err(BatchError::UnknownBatch(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_eligible_count_has_no_side_effects() {
        let target_id = Uuid::new_v4();
        let items = vec![slide(1), slide(2), slide(3)];
        let repository = Arc::new(
            InMemoryRepository::new()
                .with_target(target_id, items.clone())
                .with_completed_artifact(&items[2]),
        );
        let provider = Arc::new(ScriptedProvider::new());
        let sink = Arc::new(RecordingProgressSink::new());
        let orchestrator = orchestrator(repository, provider.clone(), sink.clone());

        let request = orchestrator.default_request(target_id, params());
        assert_eq!(orchestrator.eligible_count(target_id, &request).await.unwrap(), 2);

        let regenerate = request.clone().with_regenerate_existing(true);
        assert_eq!(orchestrator.eligible_count(target_id, &regenerate).await.unwrap(), 3);

        assert_eq!(provider.total_calls(), 0);
        assert_eq!(sink.status_count(), 0);
        assert!(orchestrator.batches_for_target(target_id).is_empty());
    }

    #[tokio::test]
    async fn test_run_that_dies_is_finished_as_aborted() {
        let sink = Arc::new(RecordingProgressSink::new());
        let status_id = sink.create_status(Uuid::new_v4(), "avatar_video_batch").await.unwrap();
        let items = vec![slide(1), slide(2)];
        let (guard, state_rx, summary) = guard_for(sink.clone(), status_id, &items);

        let run: JoinHandle<()> = tokio::spawn(async {
            panic!("scheduler bug");
        });
        guard.supervise(run).await;

        assert_eq!(*state_rx.borrow(), BatchState::Aborted);
        let summary = summary.read().clone().unwrap();
        assert_eq!(summary.state, BatchState::Aborted);
        assert_eq!(summary.initiated, 0);
        assert_eq!(
            summary.not_completed,
            items.iter().map(|item| item.item_id).collect::<Vec<_>>()
        );

        let (status, message) = sink.final_status(status_id).unwrap();
        assert_eq!(status, TerminalStatus::Failed);
        assert!(message.starts_with("aborted:"), "{message}");
        assert!(message.contains("2 not completed before the run aborted"), "{message}");
    }

    #[tokio::test]
    async fn test_run_that_finishes_leaves_nothing_for_the_guard() {
        let sink = Arc::new(RecordingProgressSink::new());
        let status_id = sink.create_status(Uuid::new_v4(), "avatar_video_batch").await.unwrap();
        let (guard, state_rx, summary) = guard_for(sink.clone(), status_id, &[slide(1)]);

        guard.supervise(tokio::spawn(async {})).await;

        assert_eq!(*state_rx.borrow(), BatchState::Running);
        assert!(summary.read().is_none());
        assert!(sink.final_status(status_id).is_none());
    }

    #[tokio::test]
    async fn test_panicking_sink_still_releases_waiters() {
        let target_id = Uuid::new_v4();
        let repository =
            Arc::new(InMemoryRepository::new().with_target(target_id, vec![slide(1), slide(2)]));
        let sink = Arc::new(RecordingProgressSink::new());
        sink.panic_on_terminal_status(true);
        let orchestrator = orchestrator(repository, Arc::new(ScriptedProvider::new()), sink.clone());

        let batch_id = orchestrator
            .submit_batch(orchestrator.default_request(target_id, params()))
            .await
            .unwrap();
        let summary = orchestrator.wait_for_batch(batch_id).await.unwrap();

        assert_eq!(summary.state, BatchState::Completed);
        assert_eq!(summary.initiated, 2);
        assert_eq!(orchestrator.batch_state(batch_id), Some(BatchState::Completed));
        let status_id = orchestrator.batch_status_id(batch_id).unwrap();
        assert!(sink.final_status(status_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_terminal_status_push_is_bounded() {
        let target_id = Uuid::new_v4();
        let repository = Arc::new(InMemoryRepository::new().with_target(target_id, vec![slide(1)]));
        let sink = Arc::new(RecordingProgressSink::new());
        sink.delay_status_updates(Duration::from_secs(3_600));
        let mut config = OrchestratorConfig::default();
        config.progress.sink_timeout_ms = 200;
        let orchestrator = BatchOrchestrator::new(
            repository,
            Arc::new(ScriptedProvider::new()),
            sink.clone(),
            Arc::new(config),
        );

        let started = tokio::time::Instant::now();
        let batch_id = orchestrator
            .submit_batch(orchestrator.default_request(target_id, params()))
            .await
            .unwrap();
        let summary = orchestrator.wait_for_batch(batch_id).await.unwrap();

        assert_eq!(summary.state, BatchState::Completed);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
