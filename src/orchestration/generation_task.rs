//! # Per-Item Generation Task
//!
//! Wraps the provider call for one slide: prerequisite check, permit
//! acquisition, then a bounded retry loop with a fixed, cancellable delay.
//! Every path ends in an [`ItemOutcome`]; nothing escapes as an error.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::constants::{error_codes, messages};
use crate::logging::log_item_operation;
use crate::models::{
    BatchPolicy, FailureKind, ItemOutcome, PrerequisiteKind, ProviderParams, WorkItem,
};
use crate::orchestration::concurrency_gate::ConcurrencyGate;
use crate::orchestration::error_classifier::{
    ErrorClassification, ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
use crate::orchestration::types::{GenerationProvider, ItemContext};

/// Shared, immutable per-batch setup for generation tasks
#[derive(Clone)]
pub struct GenerationTask {
    provider: Arc<dyn GenerationProvider>,
    classifier: Arc<dyn ErrorClassifier>,
    gate: ConcurrencyGate,
    params: Arc<ProviderParams>,
    required_prerequisites: Arc<[PrerequisiteKind]>,
    policy: BatchPolicy,
}

impl GenerationTask {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        gate: ConcurrencyGate,
        params: ProviderParams,
        required_prerequisites: Vec<PrerequisiteKind>,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            provider,
            classifier: Arc::new(StandardErrorClassifier::new()),
            gate,
            params: Arc::new(params),
            required_prerequisites: required_prerequisites.into(),
            policy,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Produce the outcome for one work item
    #[instrument(skip(self, item, cancel), fields(item_id = %item.item_id, slide = item.slide_number))]
    pub async fn run(&self, item: WorkItem, cancel: CancellationToken) -> ItemOutcome {
        if let Some(missing) = self.missing_prerequisite(&item) {
            warn!(
                item_id = %item.item_id,
                missing = %missing,
                error_code = error_codes::MISSING_PREREQUISITE,
                "Skipping provider call, required upstream artifact is missing"
            );
            return ItemOutcome::failed(
                item.item_id,
                FailureKind::Precondition,
                messages::MISSING_PREREQUISITE,
                0,
            );
        }

        let queue_start = Instant::now();
        let Some(_permit) = self.gate.acquire_or_cancel(&cancel).await else {
            debug!(item_id = %item.item_id, "Cancelled while waiting for a permit");
            return ItemOutcome::failed(
                item.item_id,
                FailureKind::Interrupted,
                messages::CANCELLED_BEFORE_CALL,
                0,
            );
        };
        debug!(
            item_id = %item.item_id,
            queue_ms = queue_start.elapsed().as_millis(),
            "Permit acquired"
        );

        // The permit is held across retries and released when this returns
        self.attempt_with_retries(&item, &cancel).await
    }

    async fn attempt_with_retries(&self, item: &WorkItem, cancel: &CancellationToken) -> ItemOutcome {
        let context = ItemContext::from(item);
        let max_attempts = self.policy.retry_attempts.max(1);
        let mut last_failure: Option<ErrorClassification> = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                let message = last_failure
                    .as_ref()
                    .map(|failure| failure.error_message.clone())
                    .unwrap_or_else(|| messages::CANCELLED_BEFORE_CALL.to_string());
                debug!(item_id = %item.item_id, attempt = attempt, "Cancelled before attempt");
                return ItemOutcome::failed(
                    item.item_id,
                    FailureKind::Interrupted,
                    message,
                    attempt - 1,
                );
            }

            let call_start = Instant::now();
            let result = self.provider.generate(&context, &self.params).await;
            let duration_ms = call_start.elapsed().as_millis();

            let error_context = ErrorContext {
                item_id: item.item_id,
                slide_number: item.slide_number,
                attempt_number: attempt,
                max_attempts,
                retry_delay: self.policy.retry_delay,
            };

            let classification = match result {
                Ok(response) if response.state.is_initiated() => {
                    log_item_operation(
                        "generate",
                        item.item_id,
                        item.slide_number,
                        attempt,
                        "initiated",
                        Some(&response.handle),
                    );
                    return ItemOutcome::initiated(item.item_id, response.handle, attempt);
                }
                Ok(response) => self
                    .classifier
                    .classify_lifecycle(&response.state, &error_context),
                Err(error) => self.classifier.classify_error(&error, &error_context),
            };

            warn!(
                item_id = %item.item_id,
                attempt = attempt,
                max_attempts = max_attempts,
                duration_ms = duration_ms,
                error_code = %classification.error_code,
                error = %classification.error_message,
                retryable = classification.is_retryable,
                "Provider call failed"
            );

            let retry_delay = classification.retry_delay;
            let is_retryable = classification.is_retryable;
            let category = classification.category;
            let message = classification.error_message.clone();
            last_failure = Some(classification);

            if !is_retryable {
                return ItemOutcome::failed(item.item_id, category, message, attempt);
            }

            if let Some(delay) = retry_delay {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(
                            item_id = %item.item_id,
                            attempt = attempt,
                            error_code = error_codes::INTERRUPTED_DURING_RETRY,
                            "Cancelled during retry delay, abandoning remaining attempts"
                        );
                        return ItemOutcome::failed(
                            item.item_id,
                            FailureKind::Interrupted,
                            message,
                            attempt,
                        );
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        // Only reachable when the classifier kept a failure retryable on the last attempt
        let (category, message) = last_failure
            .map(|c| (c.category, c.error_message))
            .unwrap_or((FailureKind::ProviderTransient, String::new()));
        ItemOutcome::failed(item.item_id, category, message, max_attempts)
    }

    fn missing_prerequisite(&self, item: &WorkItem) -> Option<PrerequisiteKind> {
        self.required_prerequisites
            .iter()
            .copied()
            .find(|kind| !item.has_active(*kind))
    }
}
