// Batch lifecycle state machine.
//
// A batch moves CREATED → RUNNING → (COMPLETED | TIMED_OUT). Timing out is not
// an error; it marks a partial summary.

pub mod batch_state_machine;
pub mod events;
pub mod states;

pub use batch_state_machine::{BatchStateMachine, StateTransitionError};
pub use events::BatchEvent;
pub use states::{BatchState, TerminalStatus};
