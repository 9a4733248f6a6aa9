//! Fixtures for presentations, requests and orchestrators

use avatar_batch::config::OrchestratorConfig;
use avatar_batch::models::{
    BatchPolicy, BatchRequest, Prerequisite, PrerequisiteKind, ProviderParams, WorkItem,
};
use avatar_batch::test_helpers::{InMemoryRepository, RecordingProgressSink, ScriptedProvider};
use avatar_batch::BatchOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Slide with narration and audio in place
pub fn ready_slide(slide_number: u32) -> WorkItem {
    WorkItem::new(slide_number)
        .with_prerequisite(Prerequisite::active(
            PrerequisiteKind::Narrative,
            format!("narrative/{slide_number}.txt"),
        ))
        .with_prerequisite(Prerequisite::active(
            PrerequisiteKind::Audio,
            format!("audio/{slide_number}.mp3"),
        ))
}

pub fn ready_slides(count: u32) -> Vec<WorkItem> {
    (1..=count).map(ready_slide).collect()
}

pub fn provider_params() -> ProviderParams {
    ProviderParams {
        variant_id: "presenter-a".to_string(),
        style: Some("formal".to_string()),
        ..Default::default()
    }
}

pub fn policy(max_concurrent: usize, per_item_timeout: Duration) -> BatchPolicy {
    BatchPolicy {
        max_concurrent,
        per_item_timeout,
        retry_attempts: 2,
        retry_delay: Duration::from_millis(10),
    }
}

pub fn request(target_id: Uuid, policy: BatchPolicy) -> BatchRequest {
    BatchRequest::new(target_id, provider_params()).with_policy(policy)
}

/// Orchestrator wired to in-memory collaborators, with handles kept for assertions
pub struct Harness {
    pub target_id: Uuid,
    pub items: Vec<WorkItem>,
    pub repository: Arc<InMemoryRepository>,
    pub provider: Arc<ScriptedProvider>,
    pub sink: Arc<RecordingProgressSink>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn new(items: Vec<WorkItem>, provider: ScriptedProvider) -> Self {
        let target_id = Uuid::new_v4();
        let repository = Arc::new(InMemoryRepository::new().with_target(target_id, items.clone()));
        Self::with_repository(target_id, items, repository, provider)
    }

    /// Same as [`Harness::new`] with a custom orchestrator configuration
    pub fn with_config(
        items: Vec<WorkItem>,
        provider: ScriptedProvider,
        config: OrchestratorConfig,
    ) -> Self {
        let target_id = Uuid::new_v4();
        let repository = Arc::new(InMemoryRepository::new().with_target(target_id, items.clone()));
        Self::build(target_id, items, repository, provider, config)
    }

    pub fn with_repository(
        target_id: Uuid,
        items: Vec<WorkItem>,
        repository: Arc<InMemoryRepository>,
        provider: ScriptedProvider,
    ) -> Self {
        Self::build(target_id, items, repository, provider, OrchestratorConfig::default())
    }

    fn build(
        target_id: Uuid,
        items: Vec<WorkItem>,
        repository: Arc<InMemoryRepository>,
        provider: ScriptedProvider,
        config: OrchestratorConfig,
    ) -> Self {
        let provider = Arc::new(provider);
        let sink = Arc::new(RecordingProgressSink::new());
        let orchestrator = BatchOrchestrator::new(
            repository.clone(),
            provider.clone(),
            sink.clone(),
            Arc::new(config),
        );
        Self {
            target_id,
            items,
            repository,
            provider,
            sink,
            orchestrator,
        }
    }

    pub fn item_id(&self, index: usize) -> Uuid {
        self.items[index].item_id
    }
}
