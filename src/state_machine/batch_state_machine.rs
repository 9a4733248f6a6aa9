use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::events::BatchEvent;
use super::states::BatchState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid batch transition from {from} on {event}")]
pub struct StateTransitionError {
    pub from: BatchState,
    pub event: &'static str,
}

/// In-memory state machine for one batch: `CREATED → RUNNING → (COMPLETED | TIMED_OUT | ABORTED)`
#[derive(Debug, Clone)]
pub struct BatchStateMachine {
    batch_id: Uuid,
    state: BatchState,
}

impl BatchStateMachine {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            state: BatchState::Created,
        }
    }

    /// Pick a batch back up at a state observed elsewhere
    pub fn resume(batch_id: Uuid, state: BatchState) -> Self {
        Self { batch_id, state }
    }

    pub fn current_state(&self) -> BatchState {
        self.state
    }

    /// Attempt to transition the batch state
    pub fn transition(&mut self, event: BatchEvent) -> Result<BatchState, StateTransitionError> {
        let target = Self::determine_target_state(self.state, event)?;

        debug!(
            batch_id = %self.batch_id,
            from = %self.state,
            to = %target,
            event = event.event_type(),
            "Batch state transition"
        );

        self.state = target;
        Ok(target)
    }

    fn determine_target_state(
        current: BatchState,
        event: BatchEvent,
    ) -> Result<BatchState, StateTransitionError> {
        match (current, event) {
            (BatchState::Created, BatchEvent::Start) => Ok(BatchState::Running),
            (BatchState::Running, BatchEvent::Finish) => Ok(BatchState::Completed),
            (BatchState::Running, BatchEvent::DeadlineElapsed) => Ok(BatchState::TimedOut),
            (BatchState::Created | BatchState::Running, BatchEvent::Abort) => Ok(BatchState::Aborted),
            (from, event) => Err(StateTransitionError {
                from,
                event: event.event_type(),
            }),
        }
    }
}
