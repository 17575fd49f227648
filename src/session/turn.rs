//! Per-turn write buffer
//!
//! A `TurnContext` collects every state write made while handling one
//! request, so the whole turn is committed as a single `StateEvent`.

use crate::error::Result;
use crate::session::Session;
use crate::state::StateAccess;
use crate::types::{StateDelta, StateEvent};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Buffered view of a session's state for one turn
///
/// Reads see the turn's own pending writes first, then the live store.
/// Nothing reaches the live store until the event from `into_event` is
/// appended through a `SessionService`.
pub struct TurnContext<'a> {
    session: &'a Session,
    invocation_id: String,
    pending: Mutex<StateDelta>,
}

impl<'a> TurnContext<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            invocation_id: format!("inv-{}", uuid::Uuid::new_v4()),
            pending: Mutex::new(StateDelta::new()),
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// Copy of the writes buffered so far
    pub fn pending(&self) -> StateDelta {
        self.lock().clone()
    }

    /// Close the turn, producing its event; `None` when nothing was written
    pub fn into_event(self, author: impl Into<String>) -> Option<StateEvent> {
        let delta = self
            .pending
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());
        if delta.is_empty() {
            return None;
        }
        Some(StateEvent::new(author, delta).with_invocation_id(self.invocation_id))
    }

    fn lock(&self) -> MutexGuard<'_, StateDelta> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateAccess for TurnContext<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.lock().get(key) {
            return Some(value.clone());
        }
        self.session.state().get(key)
    }

    fn apply_delta(&self, delta: StateDelta) -> Result<()> {
        delta.validate()?;
        self.lock().merge(delta);
        Ok(())
    }
}
