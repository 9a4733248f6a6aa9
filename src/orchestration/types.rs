//! # Orchestration Types
//!
//! Collaborator interfaces the orchestrator drives, and the values exchanged
//! with them. The orchestrator owns concurrency, retries and aggregation;
//! the provider, repository and progress sink are external systems.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ExistingArtifact, Prerequisite, ProgressSnapshot, ProviderParams, WorkItem};
use crate::state_machine::TerminalStatus;

/// Lifecycle state reported by the provider when a job is submitted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Queued,
    Processing,
    Completed,
    Failed,
    /// Anything the provider reports that this crate does not recognise
    Other(String),
}

impl LifecycleState {
    /// Whether the provider has accepted and started the job
    pub fn is_initiated(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Other(state) => write!(f, "{state}"),
        }
    }
}

impl From<&str> for LifecycleState {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "queued" | "pending" => Self::Queued,
            "processing" | "in_progress" => Self::Processing,
            "completed" | "complete" => Self::Completed,
            "failed" | "error" => Self::Failed,
            _ => Self::Other(value.to_string()),
        }
    }
}

/// What the provider hands back for an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Provider job handle, stored as the item's artifact handle
    pub handle: String,
    pub state: LifecycleState,
}

/// Per-item context sent with a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemContext {
    pub item_id: Uuid,
    pub slide_number: u32,
    pub title: Option<String>,
    /// Active upstream artifacts only
    pub prerequisites: Vec<Prerequisite>,
}

impl From<&WorkItem> for ItemContext {
    fn from(item: &WorkItem) -> Self {
        Self {
            item_id: item.item_id,
            slide_number: item.slide_number,
            title: item.title.clone(),
            prerequisites: item
                .prerequisites
                .iter()
                .filter(|p| p.active)
                .cloned()
                .collect(),
        }
    }
}

/// Errors returned by the generation provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network or 5xx-class failure
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Provider explicitly refused the request
    #[error("provider rejected request: {0}")]
    Rejected(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("target {0} not found")]
    TargetNotFound(Uuid),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("progress sink unavailable: {0}")]
    Unavailable(String),

    #[error("unknown status record {0}")]
    UnknownStatus(Uuid),
}

/// External avatar-video generation service
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name for logging
    fn provider_name(&self) -> &'static str;

    /// Submit one generation job. Completion is observed elsewhere.
    async fn generate(
        &self,
        context: &ItemContext,
        params: &ProviderParams,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Source of work items and their previously completed artifacts
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    async fn list_items(&self, target_id: Uuid) -> Result<Vec<WorkItem>, RepositoryError>;

    async fn list_existing_artifacts(
        &self,
        item_ids: &[Uuid],
        completed_only: bool,
    ) -> Result<HashMap<Uuid, ExistingArtifact>, RepositoryError>;
}

/// External status store the orchestrator reports progress to
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn create_status(&self, target_id: Uuid, kind: &str) -> Result<Uuid, SinkError>;

    /// Last write wins; calls may arrive out of item order
    async fn update_progress(
        &self,
        status_id: Uuid,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), SinkError>;

    async fn update_status(
        &self,
        status_id: Uuid,
        status: TerminalStatus,
        message: &str,
    ) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrerequisiteKind;

    #[test]
    fn test_initiated_states() {
        assert!(LifecycleState::Queued.is_initiated());
        assert!(LifecycleState::Processing.is_initiated());
        assert!(!LifecycleState::Completed.is_initiated());
        assert!(!LifecycleState::Failed.is_initiated());
        assert!(!LifecycleState::Other("paused".to_string()).is_initiated());
    }

    #[test]
    fn test_lifecycle_parsing() {
        assert_eq!(LifecycleState::from("QUEUED"), LifecycleState::Queued);
        assert_eq!(LifecycleState::from("in_progress"), LifecycleState::Processing);
        assert_eq!(
            LifecycleState::from("paused"),
            LifecycleState::Other("paused".to_string())
        );
    }

    #[test]
    fn test_item_context_drops_inactive_prerequisites() {
        let item = WorkItem::new(3)
            .with_prerequisite(Prerequisite::active(PrerequisiteKind::Audio, "audio/3.mp3"))
            .with_prerequisite(Prerequisite {
                kind: PrerequisiteKind::Narrative,
                handle: "old-script".to_string(),
                active: false,
            });

        let context = ItemContext::from(&item);
        assert_eq!(context.slide_number, 3);
        assert_eq!(context.prerequisites.len(), 1);
        assert_eq!(context.prerequisites[0].kind, PrerequisiteKind::Audio);
    }
}
