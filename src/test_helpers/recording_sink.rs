use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::models::ProgressSnapshot;
use crate::orchestration::types::{ProgressSink, SinkError};
use crate::state_machine::TerminalStatus;

/// Everything written to one status record
#[derive(Debug, Clone, Default)]
pub struct RecordedStatus {
    pub target_id: Uuid,
    pub kind: String,
    pub progress: Vec<ProgressSnapshot>,
    pub terminal: Option<(TerminalStatus, String)>,
}

/// Progress sink that keeps every write for later assertions
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    statuses: Mutex<HashMap<Uuid, RecordedStatus>>,
    fail_progress: AtomicBool,
    fail_create: AtomicBool,
    panic_on_status: AtomicBool,
    progress_latency: Mutex<Duration>,
    status_latency: Mutex<Duration>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `update_progress` calls while set
    pub fn fail_progress_updates(&self, fail: bool) {
        self.fail_progress.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_creation(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Panic inside `update_status`, standing in for a buggy sink
    pub fn panic_on_terminal_status(&self, panic: bool) {
        self.panic_on_status.store(panic, Ordering::SeqCst);
    }

    /// Sleep before applying each `update_progress` call
    pub fn delay_progress_updates(&self, latency: Duration) {
        *self.progress_latency.lock() = latency;
    }

    /// Sleep before applying each `update_status` call
    pub fn delay_status_updates(&self, latency: Duration) {
        *self.status_latency.lock() = latency;
    }

    pub fn status_count(&self) -> usize {
        self.statuses.lock().len()
    }

    pub fn status(&self, status_id: Uuid) -> Option<RecordedStatus> {
        self.statuses.lock().get(&status_id).cloned()
    }

    pub fn progress_updates(&self, status_id: Uuid) -> Vec<ProgressSnapshot> {
        self.statuses
            .lock()
            .get(&status_id)
            .map(|status| status.progress.clone())
            .unwrap_or_default()
    }

    pub fn total_progress_updates(&self) -> usize {
        self.statuses
            .lock()
            .values()
            .map(|status| status.progress.len())
            .sum()
    }

    pub fn final_status(&self, status_id: Uuid) -> Option<(TerminalStatus, String)> {
        self.statuses
            .lock()
            .get(&status_id)
            .and_then(|status| status.terminal.clone())
    }
}

#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn create_status(&self, target_id: Uuid, kind: &str) -> Result<Uuid, SinkError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("status store offline".to_string()));
        }
        let status_id = Uuid::new_v4();
        self.statuses.lock().insert(
            status_id,
            RecordedStatus {
                target_id,
                kind: kind.to_string(),
                ..Default::default()
            },
        );
        Ok(status_id)
    }

    async fn update_progress(
        &self,
        status_id: Uuid,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), SinkError> {
        let latency = *self.progress_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("status store offline".to_string()));
        }
        // Tracker tests push to ids they never created
        self.statuses
            .lock()
            .entry(status_id)
            .or_default()
            .progress
            .push(snapshot.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        status_id: Uuid,
        status: TerminalStatus,
        message: &str,
    ) -> Result<(), SinkError> {
        let latency = *self.status_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.panic_on_status.load(Ordering::SeqCst) {
            panic!("status store corrupted while writing {status}");
        }
        let mut statuses = self.statuses.lock();
        let record = statuses
            .get_mut(&status_id)
            .ok_or(SinkError::UnknownStatus(status_id))?;
        record.terminal = Some((status, message.to_string()));
        Ok(())
    }
}
