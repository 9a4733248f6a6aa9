//! # Batch Data Model
//!
//! Plain data carried through a batch run: the work items read from the
//! repository, the immutable request, and the outcomes and summary the run
//! produces. Nothing here performs I/O.

pub mod batch_request;
pub mod outcome;
pub mod work_item;

pub use batch_request::{BatchPolicy, BatchRequest, OutputOptions, ProviderParams, Selection};
pub use outcome::{BatchSummary, FailureKind, ItemOutcome, ProgressSnapshot};
pub use work_item::{ExistingArtifact, Prerequisite, PrerequisiteKind, WorkItem};
