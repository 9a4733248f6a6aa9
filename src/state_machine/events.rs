use serde::{Deserialize, Serialize};

/// Events that drive a batch through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    /// Background run picked the batch up
    Start,
    /// All submitted tasks reported an outcome
    Finish,
    /// Aggregate deadline expired with tasks outstanding
    DeadlineElapsed,
    /// Background run stopped without reaching either of the above
    Abort,
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::DeadlineElapsed => "deadline_elapsed",
            Self::Abort => "abort",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::DeadlineElapsed | Self::Abort)
    }
}
