// Test Helpers Module - In-memory collaborators for unit and integration tests
//
// Compiled for this crate's own tests and for downstream crates that enable the
// `test-utils` feature.

pub mod in_memory_repository;
pub mod recording_sink;
pub mod scripted_provider;

pub use in_memory_repository::InMemoryRepository;
pub use recording_sink::{RecordedStatus, RecordingProgressSink};
pub use scripted_provider::{ScriptedProvider, ScriptedResponse};
