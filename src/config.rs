//! Session configuration
//!
//! Identifies the app and user whose sessions are opened, and selects the
//! session backend: a JSON file when `state_path` is set, memory otherwise.

use crate::session::file::FileSessionService;
use crate::session::memory::MemorySessionService;
use crate::session::SessionService;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding `app_name`
pub const ENV_APP_NAME: &str = "A3S_STATE_APP_NAME";
/// Environment variable overriding `user_id`
pub const ENV_USER_ID: &str = "A3S_STATE_USER_ID";
/// Environment variable setting `state_path`
pub const ENV_STATE_PATH: &str = "A3S_STATE_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Session file; `None` keeps sessions in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

fn default_app_name() -> String {
    "Reading List Curator".to_string()
}

fn default_user_id() -> String {
    "demo_user".to_string()
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            user_id: default_user_id(),
            state_path: None,
        }
    }
}

impl StateConfig {
    /// Defaults overridden by any non-empty environment variables
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            app_name: var(ENV_APP_NAME).unwrap_or(defaults.app_name),
            user_id: var(ENV_USER_ID).unwrap_or(defaults.user_id),
            state_path: var(ENV_STATE_PATH).map(PathBuf::from),
        }
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Build the configured session backend
    pub fn open_service(&self) -> Box<dyn SessionService> {
        match &self.state_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using file session service");
                Box::new(FileSessionService::new(path))
            }
            None => {
                tracing::info!("Using in-memory session service");
                Box::new(MemorySessionService::new())
            }
        }
    }
}
