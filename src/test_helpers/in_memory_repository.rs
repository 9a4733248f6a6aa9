use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{ExistingArtifact, WorkItem};
use crate::orchestration::types::{RepositoryError, WorkItemRepository};

#[derive(Debug, Clone)]
struct StoredArtifact {
    artifact: ExistingArtifact,
    completed: bool,
}

/// Work items and artifacts held in memory, keyed by target
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    targets: RwLock<HashMap<Uuid, Vec<WorkItem>>>,
    artifacts: RwLock<HashMap<Uuid, StoredArtifact>>,
    unavailable: RwLock<bool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(self, target_id: Uuid, items: Vec<WorkItem>) -> Self {
        self.insert_target(target_id, items);
        self
    }

    pub fn with_completed_artifact(self, item: &WorkItem) -> Self {
        self.insert_artifact(item, true);
        self
    }

    /// Artifact that exists but never finished; does not block regeneration
    pub fn with_pending_artifact(self, item: &WorkItem) -> Self {
        self.insert_artifact(item, false);
        self
    }

    pub fn insert_target(&self, target_id: Uuid, items: Vec<WorkItem>) {
        self.targets.write().insert(target_id, items);
    }

    pub fn insert_artifact(&self, item: &WorkItem, completed: bool) {
        let artifact = ExistingArtifact {
            item_id: item.item_id,
            artifact_id: Uuid::new_v4(),
            handle: format!("video/slide-{}.mp4", item.slide_number),
            completed_at: Utc::now(),
        };
        self.artifacts
            .write()
            .insert(item.item_id, StoredArtifact { artifact, completed });
    }

    /// Make every call fail with `RepositoryError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if *self.unavailable.read() {
            return Err(RepositoryError::Unavailable("repository offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkItemRepository for InMemoryRepository {
    async fn list_items(&self, target_id: Uuid) -> Result<Vec<WorkItem>, RepositoryError> {
        self.check_available()?;
        self.targets
            .read()
            .get(&target_id)
            .cloned()
            .ok_or(RepositoryError::TargetNotFound(target_id))
    }

    async fn list_existing_artifacts(
        &self,
        item_ids: &[Uuid],
        completed_only: bool,
    ) -> Result<HashMap<Uuid, ExistingArtifact>, RepositoryError> {
        self.check_available()?;
        let artifacts = self.artifacts.read();
        Ok(item_ids
            .iter()
            .filter_map(|id| artifacts.get(id))
            .filter(|stored| !completed_only || stored.completed)
            .map(|stored| (stored.artifact.item_id, stored.artifact.clone()))
            .collect())
    }
}
