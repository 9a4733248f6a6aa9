use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::BatchState;

/// Why an item was not initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required upstream input missing; never retried
    Precondition,
    /// Retryable provider failure that exhausted its attempts
    ProviderTransient,
    /// Provider explicitly refused the request
    ProviderRejection,
    /// Cancellation observed while waiting for a permit or between attempts
    Interrupted,
    /// The generation task died without reporting (panic)
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition => write!(f, "precondition"),
            Self::ProviderTransient => write!(f, "provider_transient"),
            Self::ProviderRejection => write!(f, "provider_rejection"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Result of processing one work item, produced exactly once per item.
///
/// `initiated` means the provider accepted the job; completion of the video
/// itself is tracked elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: Uuid,
    pub initiated: bool,
    pub error_message: Option<String>,
    pub artifact_handle: Option<String>,
    pub failure: Option<FailureKind>,
    /// Provider calls made for this item
    pub attempts: u32,
}

impl ItemOutcome {
    pub fn initiated(item_id: Uuid, artifact_handle: String, attempts: u32) -> Self {
        Self {
            item_id,
            initiated: true,
            error_message: None,
            artifact_handle: Some(artifact_handle),
            failure: None,
            attempts,
        }
    }

    pub fn failed(
        item_id: Uuid,
        failure: FailureKind,
        error_message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            item_id,
            initiated: false,
            error_message: Some(error_message.into()),
            artifact_handle: None,
            failure: Some(failure),
            attempts,
        }
    }
}

/// Terminal aggregate of a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub target_id: Uuid,
    pub state: BatchState,
    /// Items selected by the request
    pub total_items: usize,
    /// Items that required a provider call
    pub eligible_items: usize,
    pub initiated: usize,
    pub failed: usize,
    /// Selected items that already had a completed artifact
    pub skipped: usize,
    /// Eligible items with no outcome when the deadline elapsed or the run aborted
    pub not_completed: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Outcomes in work-list order
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchSummary {
    pub fn is_timed_out(&self) -> bool {
        self.state == BatchState::TimedOut
    }

    pub fn status_message(&self) -> String {
        let mut message = format!(
            "{} of {} slides initiated, {} failed, {} skipped",
            self.initiated, self.eligible_items, self.failed, self.skipped
        );
        if !self.not_completed.is_empty() {
            let cutoff = if self.state == BatchState::Aborted {
                "the run aborted"
            } else {
                "the batch deadline"
            };
            message.push_str(&format!(
                ", {} not completed before {cutoff}",
                self.not_completed.len()
            ));
        }
        message
    }
}

/// Counters pushed to the progress sink after each completed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_items: usize,
    pub processed_items: usize,
    pub failed_items: usize,
    pub message: String,
}
