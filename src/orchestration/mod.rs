//! # Batch Orchestration
//!
//! Bounded-concurrency fan-out of avatar-video generation over the slides of
//! one presentation.
//!
//! ## Core Components
//!
//! - **Eligibility**: selects slides and drops those that already have a completed video
//! - **GenerationTask**: prerequisite check, permit, provider call with fixed-delay retries
//! - **ConcurrencyGate**: counting semaphore bounding in-flight provider calls
//! - **BatchScheduler**: spawns one task per slide and enforces the aggregate deadline
//! - **ProgressTracker**: atomic counters pushed to the progress sink per outcome
//! - **ResultAggregator**: folds outcomes into the terminal `BatchSummary`
//! - **BatchOrchestrator**: inbound API and registry of submitted batches
//!
//! Collaborators (provider, repository, progress sink) are traits in [`types`].

pub mod batch_scheduler;
pub mod concurrency_gate;
pub mod eligibility;
pub mod error_classifier;
pub mod generation_task;
pub mod orchestrator;
pub mod progress_tracker;
pub mod result_aggregator;
pub mod types;

pub use batch_scheduler::{BatchScheduler, ScheduleExit};
pub use concurrency_gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use eligibility::{filter_eligible, select_items, Eligibility};
pub use error_classifier::{
    ErrorClassification, ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
pub use generation_task::GenerationTask;
pub use orchestrator::BatchOrchestrator;
pub use progress_tracker::{ProgressCounters, ProgressTracker};
pub use result_aggregator::{summarize, ResultAggregator, SummaryContext};
pub use types::{
    GenerationProvider, ItemContext, LifecycleState, ProgressSink, ProviderError,
    ProviderResponse, RepositoryError, SinkError, WorkItemRepository,
};
