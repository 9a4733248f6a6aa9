use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Registered, background run not yet started
    #[default]
    Created,
    /// Generation tasks are being scheduled
    Running,
    /// Every submitted task produced an outcome before the deadline
    Completed,
    /// The aggregate deadline elapsed with tasks still pending
    TimedOut,
    /// The background run itself failed before it could finish the batch
    Aborted,
}

impl BatchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Aborted)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Status reported to the progress sink once the batch is terminal.
    ///
    /// Timed-out and aborted batches are reported as failed; partial counts
    /// travel in the status message.
    pub fn terminal_status(&self) -> Option<TerminalStatus> {
        match self {
            Self::Completed => Some(TerminalStatus::Completed),
            Self::TimedOut | Self::Aborted => Some(TerminalStatus::Failed),
            Self::Created | Self::Running => None,
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for BatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "timed_out" => Ok(Self::TimedOut),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid batch state: {s}")),
        }
    }
}

/// Terminal status vocabulary understood by the progress sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Completed,
    Failed,
}


impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!BatchState::Created.is_terminal());
        assert!(!BatchState::Running.is_terminal());
        assert!(BatchState::Completed.is_terminal());
        assert!(BatchState::TimedOut.is_terminal());
        assert!(BatchState::Aborted.is_terminal());
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in [
            BatchState::Created,
            BatchState::Running,
            BatchState::Completed,
            BatchState::TimedOut,
            BatchState::Aborted,
        ] {
            assert_eq!(state.to_string().parse::<BatchState>().unwrap(), state);
        }
        assert!("cancelled".parse::<BatchState>().is_err());
    }

    #[test]
    fn test_terminal_status_mapping() {
        assert_eq!(
            BatchState::Completed.terminal_status(),
            Some(TerminalStatus::Completed)
        );
        assert_eq!(
            BatchState::TimedOut.terminal_status(),
            Some(TerminalStatus::Failed)
        );
        assert_eq!(
            BatchState::Aborted.terminal_status(),
            Some(TerminalStatus::Failed)
        );
        assert_eq!(BatchState::Running.terminal_status(), None);
    }
}
