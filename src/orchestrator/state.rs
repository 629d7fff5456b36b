//! Per-request lifecycle: `RECEIVED -> VALIDATED -> EXTRACTED -> CHUNKED -> DISPATCHED -> COMPLETED`,
//! with `ERRORED` reachable from any non-terminal state.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Lifecycle state of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Accepted and registered.
    Received,
    /// Parameters and document reference checked.
    Validated,
    /// Document text available.
    Extracted,
    /// Text split into chunks.
    Chunked,
    /// Prompts issued to the model gateway.
    Dispatched,
    /// Result assembled.
    Completed,
    /// Ended with an error.
    Errored,
}

impl RunState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (current, Errored) => !current.is_terminal(),
            (Received, Validated)
            | (Validated, Extracted)
            | (Extracted, Chunked)
            | (Chunked, Dispatched)
            | (Dispatched, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Received => "RECEIVED",
            Self::Validated => "VALIDATED",
            Self::Extracted => "EXTRACTED",
            Self::Chunked => "CHUNKED",
            Self::Dispatched => "DISPATCHED",
            Self::Completed => "COMPLETED",
            Self::Errored => "ERRORED",
        };
        f.write_str(label)
    }
}

/// Attempted transition outside the state machine.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal state transition {from} -> {to}")]
pub struct TransitionError {
    /// State the run was in.
    pub from: RunState,
    /// State that was requested.
    pub to: RunState,
}
