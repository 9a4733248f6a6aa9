#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Avatar Batch Core
//!
//! Bounded-concurrency orchestration of avatar-video generation across the
//! slides of a presentation.
//!
//! ## Overview
//!
//! A batch takes every selected slide that does not already have a completed
//! video, checks that its upstream artifacts (narration, audio) exist, and
//! submits a generation job to an external provider. At most
//! `max_concurrent` provider calls run at once, transient failures are
//! retried after a fixed delay, and the whole batch is bounded by an
//! aggregate deadline of `items × per_item_timeout`. One slide failing never
//! fails the batch.
//!
//! ## Module Organization
//!
//! - [`models`] - Work items, batch requests, outcomes and summaries
//! - [`orchestration`] - Eligibility, generation tasks, scheduler and the inbound API
//! - [`state_machine`] - Batch lifecycle `CREATED → RUNNING → COMPLETED | TIMED_OUT | ABORTED`
//! - [`config`] - Layered YAML + environment configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use avatar_batch::{BatchOrchestrator, ConfigManager, ProviderParams};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     repository: Arc<dyn avatar_batch::WorkItemRepository>,
//! #     provider: Arc<dyn avatar_batch::GenerationProvider>,
//! #     sink: Arc<dyn avatar_batch::ProgressSink>,
//! #     presentation_id: uuid::Uuid,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let orchestrator =
//!     BatchOrchestrator::new(repository, provider, sink, Arc::new(manager.config().clone()));
//!
//! let params = ProviderParams {
//!     variant_id: "presenter-a".to_string(),
//!     ..Default::default()
//! };
//! let batch_id = orchestrator
//!     .submit_batch(orchestrator.default_request(presentation_id, params))
//!     .await?;
//! let summary = orchestrator.wait_for_batch(batch_id).await?;
//! println!("{}", summary.status_message());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use config::{ConfigManager, OrchestratorConfig};
pub use error::{BatchError, Result};
pub use models::{
    BatchPolicy, BatchRequest, BatchSummary, FailureKind, ItemOutcome, Prerequisite,
    PrerequisiteKind, ProgressSnapshot, ProviderParams, Selection, WorkItem,
};
pub use orchestration::{
    BatchOrchestrator, GenerationProvider, LifecycleState, ProgressSink, ProviderError,
    WorkItemRepository,
};
pub use state_machine::{BatchState, TerminalStatus};
