//! In-flight request registry.
//!
//! Guarantees at most one concurrent run per `request_id`. The mutex covers only the map and
//! is never held across an `.await`.

use super::state::{RunState, TransitionError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct Entry {
    task: String,
    state: RunState,
    started_at: Instant,
}

/// Snapshot of an in-flight request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InFlightStatus {
    /// Request identifier.
    pub request_id: String,
    /// Task name as submitted.
    pub task: String,
    /// Current lifecycle state.
    pub state: RunState,
    /// Seconds since the request was received.
    pub elapsed_secs: f64,
}

/// Registry of requests currently being handled.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InFlightRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `request_id` in the `RECEIVED` state.
    ///
    /// Returns `None` when the id is already in flight. The entry is removed when the returned
    /// guard is dropped.
    pub fn try_insert(self: &Arc<Self>, request_id: &str, task: &str) -> Option<InFlightGuard> {
        let mut entries = self.lock();
        if entries.contains_key(request_id) {
            return None;
        }
        entries.insert(
            request_id.to_string(),
            Entry {
                task: task.to_string(),
                state: RunState::Received,
                started_at: Instant::now(),
            },
        );
        Some(InFlightGuard {
            registry: Arc::clone(self),
            request_id: request_id.to_string(),
            state: RunState::Received,
        })
    }

    /// Current status of `request_id`, if it is in flight.
    pub fn status(&self, request_id: &str) -> Option<InFlightStatus> {
        self.lock().get(request_id).map(|entry| InFlightStatus {
            request_id: request_id.to_string(),
            task: entry.task.clone(),
            state: entry.state,
            elapsed_secs: entry.started_at.elapsed().as_secs_f64(),
        })
    }

    /// Number of requests in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no requests are in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn set_state(&self, request_id: &str, state: RunState) {
        if let Some(entry) = self.lock().get_mut(request_id) {
            entry.state = state;
        }
    }

    fn remove(&self, request_id: &str) {
        self.lock().remove(request_id);
    }
}

/// Ownership of a registry entry for the lifetime of one run.
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    request_id: String,
    state: RunState,
}

impl InFlightGuard {
    /// Current state of the run.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move the run to `next`, rejecting edges the state machine does not allow.
    pub fn advance(&mut self, next: RunState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(
            request_id = %self.request_id,
            from = %self.state,
            to = %next,
            "Request state transition"
        );
        self.state = next;
        self.registry.set_state(&self.request_id, next);
        Ok(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.request_id);
    }
}
