//! Core state types for the a3s-state system
//!
//! Keys are namespaced by prefix. All serialized types use camelCase JSON.

use crate::error::{Result, StateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value mapping held by a state store
pub type StateMap = serde_json::Map<String, Value>;

/// Prefix for keys shared across all sessions of one user
pub const USER_PREFIX: &str = "user:";

/// Prefix for keys discarded after the event that introduced them
pub const TEMP_PREFIX: &str = "temp:";

/// Persistence scope of a state key, derived from its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Unprefixed keys, living as long as the session
    Session,
    /// `user:` keys, living across sessions of the same user
    User,
    /// `temp:` keys, dropped at the next delta application
    Temp,
}

impl Scope {
    /// Classify a key by its prefix
    pub fn of(key: &str) -> Self {
        if key.starts_with(USER_PREFIX) {
            Scope::User
        } else if key.starts_with(TEMP_PREFIX) {
            Scope::Temp
        } else {
            Scope::Session
        }
    }

    /// Key prefix for this scope (empty for session scope)
    pub fn prefix(&self) -> &'static str {
        match self {
            Scope::Session => "",
            Scope::User => USER_PREFIX,
            Scope::Temp => TEMP_PREFIX,
        }
    }

    /// Whether keys in this scope are written to durable storage
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Scope::Temp)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Session => write!(f, "session"),
            Scope::User => write!(f, "user"),
            Scope::Temp => write!(f, "temp"),
        }
    }
}

/// Reject keys that are empty or carry a namespace prefix with no name
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StateError::InvalidKey("key cannot be empty".to_string()));
    }
    let scope = Scope::of(key);
    if key.len() == scope.prefix().len() {
        return Err(StateError::InvalidKey(format!(
            "key '{}' has a {} prefix but no name",
            key, scope
        )));
    }
    Ok(())
}

/// A set of key writes applied to a state store as one logical step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta {
    entries: StateMap,
}

impl StateDelta {
    /// Create an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a delta from a JSON object
    ///
    /// Fails with `InvalidKey` when the value is not an object or any key
    /// is malformed.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(entries) => {
                let delta = Self { entries };
                delta.validate()?;
                Ok(delta)
            }
            other => Err(StateError::InvalidKey(format!(
                "delta must be a JSON object keyed by strings, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Add a key write
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a key write in place, returning the replaced value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Fold another delta into this one; later writes win
    pub fn merge(&mut self, other: StateDelta) {
        self.entries.extend(other.entries);
    }

    /// Value written for a key, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Check every key
    pub fn validate(&self) -> Result<()> {
        self.entries.keys().try_for_each(|k| validate_key(k))
    }

    /// Copy of this delta restricted to one scope
    pub fn scoped(&self, scope: Scope) -> StateDelta {
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| Scope::of(k) == scope)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { entries }
    }

    /// Copy of this delta without `temp:` keys
    pub fn without_temp(&self) -> StateDelta {
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| Scope::of(k).is_persistent())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { entries }
    }

    /// Iterate over key writes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Underlying key/value mapping
    pub fn into_map(self) -> StateMap {
        self.entries
    }
}

impl IntoIterator for StateDelta {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A named, timestamped delta submitted to a session for durable logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEvent {
    /// Unique event identifier (evt-<uuid>)
    pub id: String,

    /// Identifier of the turn that produced this event
    #[serde(default)]
    pub invocation_id: String,

    /// Who produced the event (e.g., "system", "user", an agent name)
    pub author: String,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,

    /// State writes carried by the event
    #[serde(default)]
    pub delta: StateDelta,
}

impl StateEvent {
    /// Create a new event with auto-generated id and timestamp
    pub fn new(author: impl Into<String>, delta: StateDelta) -> Self {
        Self {
            id: format!("evt-{}", uuid::Uuid::new_v4()),
            invocation_id: String::new(),
            author: author.into(),
            timestamp: now_millis(),
            delta,
        }
    }

    /// Set the invocation id
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = invocation_id.into();
        self
    }

    /// Override the timestamp (Unix milliseconds)
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
