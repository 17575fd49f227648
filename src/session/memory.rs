//! In-memory session service
//!
//! Sessions live in a table under a `tokio::sync::RwLock` and are lost
//! on drop. Suited to tests and single-process use.

use crate::error::Result;
use crate::session::{Session, SessionInfo, SessionService, SessionTable};
use crate::types::{StateEvent, StateMap};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Session service backed by process memory
#[derive(Default)]
pub struct MemorySessionService {
    table: RwLock<SessionTable>,
}

impl MemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for MemorySessionService {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: Option<StateMap>,
        session_id: Option<&str>,
    ) -> Result<Session> {
        let mut table = self.table.write().await;
        table.create(app_name, user_id, state, session_id)
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>> {
        let table = self.table.read().await;
        table.get(app_name, user_id, session_id)
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionInfo>> {
        let table = self.table.read().await;
        Ok(table.list(app_name, user_id))
    }

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<()> {
        let mut table = self.table.write().await;
        table.delete(app_name, user_id, session_id);
        Ok(())
    }

    async fn append_event(&self, session: &mut Session, event: StateEvent) -> Result<StateEvent> {
        let mut table = self.table.write().await;
        table.append(session, event)?.commit(session)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
