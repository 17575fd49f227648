//! Session service: the owner of persisted session state
//!
//! All session backends (in-memory, JSON file, etc.) implement
//! `SessionService`. A session's live `StateStore` is rebuilt from its
//! persisted session-scoped state merged with the owning user's `user:`
//! state; `temp:` keys are never persisted.

use crate::error::{Result, StateError};
use crate::state::{StateAccess, StateStore};
use crate::types::{validate_key, Scope, StateDelta, StateEvent, StateMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod file;
pub mod memory;
mod turn;

pub use turn::TurnContext;

/// Core trait for session backends
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a session, generating an id when `session_id` is `None`
    ///
    /// `user:` keys in `state` seed the user's shared state, `temp:` keys
    /// are dropped, everything else becomes session state.
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: Option<StateMap>,
        session_id: Option<&str>,
    ) -> Result<Session>;

    /// Load a session with its live state
    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>>;

    /// List a user's sessions, most recently updated first
    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionInfo>>;

    /// Delete a session record (user state is kept)
    async fn delete_session(&self, app_name: &str, user_id: &str, session_id: &str)
        -> Result<()>;

    /// Log an event durably, then apply its delta to the session
    ///
    /// Returns the event as persisted, with `temp:` keys stripped. On error
    /// the live session is left as it was.
    async fn append_event(&self, session: &mut Session, event: StateEvent) -> Result<StateEvent>;

    /// Backend name (e.g., "memory", "file")
    fn name(&self) -> &str;

    /// Continue the user's most recent session, or create one
    ///
    /// Returns the session and whether it was newly created.
    async fn find_or_create_session(
        &self,
        app_name: &str,
        user_id: &str,
        initial_state: StateMap,
    ) -> Result<(Session, bool)> {
        let existing = self.list_sessions(app_name, user_id).await?;
        if let Some(info) = existing.first() {
            if let Some(session) = self.get_session(app_name, user_id, &info.id).await? {
                tracing::info!(session = %session.id, app = app_name, user = user_id, "Continuing existing session");
                return Ok((session, false));
            }
        }

        let session = self
            .create_session(app_name, user_id, Some(initial_state), None)
            .await?;
        Ok((session, true))
    }
}

/// A loaded session: identity, event log, and live state
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,

    /// Events appended so far, `temp:` keys stripped
    pub events: Vec<StateEvent>,

    pub last_update_time: DateTime<Utc>,

    state: Arc<StateStore>,
}

impl Session {
    /// Live state of this session
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Shared handle to the live state, for concurrent read-only inspection
    pub fn state_handle(&self) -> Arc<StateStore> {
        Arc::clone(&self.state)
    }

    /// Begin buffering the writes of one turn
    pub fn turn(&self) -> TurnContext<'_> {
        TurnContext::new(self)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            app_name: self.app_name.clone(),
            user_id: self.user_id.clone(),
            event_count: self.events.len(),
            last_update_time: self.last_update_time,
        }
    }
}

/// Session summary returned by listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub event_count: usize,
    pub last_update_time: DateTime<Utc>,
}

/// Persisted form of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionRecord {
    id: String,
    app_name: String,
    user_id: String,
    /// Session-scoped keys only
    #[serde(default)]
    state: StateMap,
    #[serde(default)]
    events: Vec<StateEvent>,
    last_update_time: DateTime<Utc>,
}

impl SessionRecord {
    fn matches(&self, app_name: &str, user_id: &str, session_id: &str) -> bool {
        self.app_name == app_name && self.user_id == user_id && self.id == session_id
    }
}

/// Persisted `user:` state shared by a user's sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserStateRecord {
    app_name: String,
    user_id: String,
    #[serde(default)]
    state: StateMap,
}

/// An event already recorded in a `SessionTable` but not yet reflected in
/// the caller's live `Session`
#[derive(Debug)]
pub(crate) struct PendingAppend {
    /// Full delta, `temp:` keys included, for the live store
    delta: StateDelta,
    logged: StateEvent,
    updated_at: DateTime<Utc>,
}

impl PendingAppend {
    /// Apply the event to the live session, returning the event as logged
    pub(crate) fn commit(self, session: &mut Session) -> Result<StateEvent> {
        session.state.apply_delta(self.delta)?;
        session.events.push(self.logged.clone());
        session.last_update_time = self.updated_at;

        tracing::debug!(
            session = %session.id,
            event_id = %self.logged.id,
            author = %self.logged.author,
            persisted = self.logged.delta.len(),
            "Event appended"
        );
        Ok(self.logged)
    }
}

/// Every session and user record of a backend
///
/// Backends differ only in where this table lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionTable {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
    #[serde(default)]
    users: Vec<UserStateRecord>,
}

impl SessionTable {
    pub(crate) fn create(
        &mut self,
        app_name: &str,
        user_id: &str,
        state: Option<StateMap>,
        session_id: Option<&str>,
    ) -> Result<Session> {
        let id = match session_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        if self.sessions.iter().any(|r| r.matches(app_name, user_id, &id)) {
            return Err(StateError::SessionExists(id));
        }

        let initial = state.unwrap_or_default();
        initial.keys().try_for_each(|k| validate_key(k))?;

        let mut session_state = StateMap::new();
        let mut user_state = StateMap::new();
        for (key, value) in initial {
            match Scope::of(&key) {
                Scope::Session => {
                    session_state.insert(key, value);
                }
                Scope::User => {
                    user_state.insert(key, value);
                }
                Scope::Temp => {}
            }
        }
        self.user_record(app_name, user_id).state.extend(user_state);

        let record = SessionRecord {
            id,
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state: session_state,
            events: Vec::new(),
            last_update_time: Utc::now(),
        };
        let session = self.load(&record)?;
        self.sessions.push(record);

        tracing::info!(session = %session.id, app = app_name, user = user_id, "Session created");
        Ok(session)
    }

    pub(crate) fn get(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>> {
        self.sessions
            .iter()
            .find(|r| r.matches(app_name, user_id, session_id))
            .map(|r| self.load(r))
            .transpose()
    }

    pub(crate) fn list(&self, app_name: &str, user_id: &str) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .iter()
            .filter(|r| r.app_name == app_name && r.user_id == user_id)
            .map(|r| SessionInfo {
                id: r.id.clone(),
                app_name: r.app_name.clone(),
                user_id: r.user_id.clone(),
                event_count: r.events.len(),
                last_update_time: r.last_update_time,
            })
            .collect();
        infos.sort_by(|a, b| b.last_update_time.cmp(&a.last_update_time));
        infos
    }

    pub(crate) fn delete(&mut self, app_name: &str, user_id: &str, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions
            .retain(|r| !r.matches(app_name, user_id, session_id));
        let removed = self.sessions.len() != before;
        if removed {
            tracing::info!(session = session_id, app = app_name, user = user_id, "Session deleted");
        } else {
            tracing::debug!(session = session_id, "Delete of unknown session ignored");
        }
        removed
    }

    /// Record an event against the stored session without touching the live
    /// session; the returned `PendingAppend` is committed once the table is saved
    pub(crate) fn append(&mut self, session: &Session, event: StateEvent) -> Result<PendingAppend> {
        let index = self
            .sessions
            .iter()
            .position(|r| r.matches(&session.app_name, &session.user_id, &session.id))
            .ok_or_else(|| StateError::SessionNotFound(session.id.clone()))?;
        event.delta.validate()?;

        let durable = event.delta.without_temp();
        let user_writes = durable.scoped(Scope::User);
        if !user_writes.is_empty() {
            self.user_record(&session.app_name, &session.user_id)
                .state
                .extend(user_writes.into_map());
        }

        let record = &mut self.sessions[index];
        record
            .state
            .extend(durable.scoped(Scope::Session).into_map());

        let live = event.delta.clone();
        let logged = StateEvent {
            delta: durable,
            ..event
        };
        let updated_at = Utc::now();
        record.events.push(logged.clone());
        record.last_update_time = updated_at;

        Ok(PendingAppend {
            delta: live,
            logged,
            updated_at,
        })
    }

    fn load(&self, record: &SessionRecord) -> Result<Session> {
        let mut state = record.state.clone();
        if let Some(user) = self
            .users
            .iter()
            .find(|u| u.app_name == record.app_name && u.user_id == record.user_id)
        {
            state.extend(user.state.clone());
        }

        Ok(Session {
            id: record.id.clone(),
            app_name: record.app_name.clone(),
            user_id: record.user_id.clone(),
            events: record.events.clone(),
            last_update_time: record.last_update_time,
            state: Arc::new(StateStore::from_snapshot(state)?),
        })
    }

    fn user_record(&mut self, app_name: &str, user_id: &str) -> &mut UserStateRecord {
        let index = match self
            .users
            .iter()
            .position(|u| u.app_name == app_name && u.user_id == user_id)
        {
            Some(index) => index,
            None => {
                self.users.push(UserStateRecord {
                    app_name: app_name.to_string(),
                    user_id: user_id.to_string(),
                    state: StateMap::new(),
                });
                self.users.len() - 1
            }
        };
        &mut self.users[index]
    }
}
