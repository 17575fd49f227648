//! JSON file-based session service
//!
//! Persists every session and user record as one JSON file on disk.
//! Each call loads the file, mutates the table, and writes it back
//! atomically via temp file + rename. Calls are serialized by a mutex.

use crate::error::{Result, StateError};
use crate::session::{Session, SessionInfo, SessionService, SessionTable};
use crate::types::{StateEvent, StateMap};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Session service backed by a JSON file
pub struct FileSessionService {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionService {
    /// Create a file session service at the given path
    ///
    /// The file is created on first write; a missing file reads as empty.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_table(&self) -> Result<SessionTable> {
        let exists = fs::try_exists(&self.path).await.map_err(|e| {
            StateError::Storage(format!(
                "Failed to stat session file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        if !exists {
            return Ok(SessionTable::default());
        }

        let json = fs::read_to_string(&self.path).await.map_err(|e| {
            StateError::Storage(format!(
                "Failed to read session file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let table: SessionTable = serde_json::from_str(&json).map_err(|e| {
            StateError::Storage(format!(
                "Failed to parse session file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Session table loaded");
        Ok(table)
    }

    async fn save_table(&self, table: &SessionTable) -> Result<()> {
        let json = serde_json::to_string_pretty(table)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    StateError::Storage(format!(
                        "Failed to create session directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            StateError::Storage(format!(
                "Failed to rename session file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Session table saved");
        Ok(())
    }
}

#[async_trait]
impl SessionService for FileSessionService {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: Option<StateMap>,
        session_id: Option<&str>,
    ) -> Result<Session> {
        let _guard = self.lock.lock().await;
        let mut table = self.load_table().await?;
        let session = table.create(app_name, user_id, state, session_id)?;
        self.save_table(&table).await?;
        Ok(session)
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>> {
        let _guard = self.lock.lock().await;
        let table = self.load_table().await?;
        table.get(app_name, user_id, session_id)
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionInfo>> {
        let _guard = self.lock.lock().await;
        let table = self.load_table().await?;
        Ok(table.list(app_name, user_id))
    }

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut table = self.load_table().await?;
        if table.delete(app_name, user_id, session_id) {
            self.save_table(&table).await?;
        }
        Ok(())
    }

    async fn append_event(&self, session: &mut Session, event: StateEvent) -> Result<StateEvent> {
        let _guard = self.lock.lock().await;
        let mut table = self.load_table().await?;
        let pending = table.append(session, event)?;
        // The live session only changes once the write has landed
        self.save_table(&table).await?;
        pending.commit(session)
    }

    fn name(&self) -> &str {
        "file"
    }
}
