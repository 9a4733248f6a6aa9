//! # Progress Tracker
//!
//! Lock-free running counters for a batch. Each recorded outcome produces a
//! snapshot that is handed to a dedicated writer task over a channel, so a
//! slow or stalled progress sink never holds up outcome collection. Sink
//! writes are last-write-wins and are applied in the order snapshots were
//! produced; counters only grow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ItemOutcome, ProgressSnapshot};
use crate::orchestration::types::ProgressSink;

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressCounters {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct ProgressTracker {
    status_id: Uuid,
    total_items: usize,
    skipped: usize,
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    updates: mpsc::UnboundedSender<ProgressSnapshot>,
    writer: JoinHandle<()>,
}

impl ProgressTracker {
    /// Build a tracker and start its sink writer on the current runtime
    pub fn new(
        sink: Arc<dyn ProgressSink>,
        status_id: Uuid,
        total_items: usize,
        skipped: usize,
    ) -> Self {
        let (updates, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_progress(sink, status_id, receiver));

        Self {
            status_id,
            total_items,
            skipped,
            processed: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            updates,
            writer,
        }
    }

    pub fn status_id(&self) -> Uuid {
        self.status_id
    }

    /// Count one outcome and queue the resulting snapshot for the sink
    pub fn record(&self, outcome: &ItemOutcome) -> ProgressSnapshot {
        let processed = self.processed.fetch_add(1, Ordering::AcqRel) + 1;
        let failed = if outcome.initiated {
            self.succeeded.fetch_add(1, Ordering::AcqRel);
            self.failed.load(Ordering::Acquire)
        } else {
            self.failed.fetch_add(1, Ordering::AcqRel) + 1
        };

        let snapshot = self.build_snapshot(processed, failed);
        debug!(
            status_id = %self.status_id,
            item_id = %outcome.item_id,
            processed = snapshot.processed_items,
            failed = snapshot.failed_items,
            "Recording item progress"
        );
        self.push(snapshot.clone());
        snapshot
    }

    /// Queue the current counters without recording an outcome
    pub fn publish(&self) -> ProgressSnapshot {
        let counters = self.counters();
        let snapshot = self.build_snapshot(counters.processed, counters.failed);
        self.push(snapshot.clone());
        snapshot
    }

    pub fn counters(&self) -> ProgressCounters {
        ProgressCounters {
            processed: self.processed.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }

    /// Stop accepting snapshots and wait up to `timeout` for queued writes.
    ///
    /// Returns `false` when the sink could not keep up; the writer is then
    /// aborted so no stale progress lands after the terminal status.
    pub async fn close(self, timeout: Duration) -> bool {
        let Self {
            status_id,
            updates,
            mut writer,
            ..
        } = self;
        drop(updates);

        match tokio::time::timeout(timeout, &mut writer).await {
            Ok(Ok(())) => true,
            Ok(Err(join_error)) => {
                warn!(
                    status_id = %status_id,
                    error = %join_error,
                    "Progress writer stopped unexpectedly"
                );
                false
            }
            Err(_) => {
                writer.abort();
                warn!(
                    status_id = %status_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Progress sink did not drain in time; dropping queued updates"
                );
                false
            }
        }
    }

    fn build_snapshot(&self, processed: usize, failed: usize) -> ProgressSnapshot {
        let processed_items = processed + self.skipped;
        ProgressSnapshot {
            total_items: self.total_items,
            processed_items,
            failed_items: failed,
            message: format!(
                "Processed {processed_items}/{} slides ({failed} failed)",
                self.total_items
            ),
        }
    }

    fn push(&self, snapshot: ProgressSnapshot) {
        if self.updates.send(snapshot).is_err() {
            warn!(
                status_id = %self.status_id,
                "Progress writer is gone; update dropped"
            );
        }
    }
}

async fn write_progress(
    sink: Arc<dyn ProgressSink>,
    status_id: Uuid,
    mut receiver: mpsc::UnboundedReceiver<ProgressSnapshot>,
) {
    while let Some(snapshot) = receiver.recv().await {
        if let Err(e) = sink.update_progress(status_id, &snapshot).await {
            warn!(
                status_id = %status_id,
                error = %e,
                "Failed to push progress update"
            );
        }
    }
}
