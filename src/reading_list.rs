//! Reading list kept in session state
//!
//! Items live as an ordered array under the session-scoped `reading_list`
//! key and are addressed by 1-based position. Positions are not stable:
//! removing an item shifts every later item down by one.
//!
//! Input is normalized rather than rejected. An unknown status falls back
//! to `queued` when adding and is ignored when updating; the only errors
//! are positional misses and malformed stored state.

use crate::error::{Result, StateError};
use crate::state::StateAccess;
use crate::types::{StateDelta, StateMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session key holding the item array
pub const READING_LIST_KEY: &str = "reading_list";

/// Session key holding the user's display name
pub const USER_NAME_KEY: &str = "user_name";

/// Title stored when a blank title is supplied
pub const UNTITLED: &str = "(untitled)";

/// Reading progress of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Queued,
    Reading,
    Done,
}

impl ItemStatus {
    /// Parse an exact status name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ItemStatus::Queued),
            "reading" => Some(ItemStatus::Reading),
            "done" => Some(ItemStatus::Done),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Reading => "reading",
            ItemStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the reading list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingListItem {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub notes: String,
}

impl ReadingListItem {
    /// Build a normalized item
    ///
    /// Text fields are trimmed, blank tags dropped, a blank title becomes
    /// `(untitled)`, and a missing or unknown status becomes `queued`.
    pub fn new<I, S>(title: &str, url: &str, tags: I, status: Option<&str>, notes: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let status = match status.map(|s| (s, ItemStatus::parse(s))) {
            Some((_, Some(parsed))) => parsed,
            Some((raw, None)) => {
                tracing::warn!(status = raw, "Unknown item status, defaulting to queued");
                ItemStatus::Queued
            }
            None => ItemStatus::Queued,
        };

        let title = title.trim();
        Self {
            title: if title.is_empty() {
                UNTITLED.to_string()
            } else {
                title.to_string()
            },
            url: url.trim().to_string(),
            tags: normalize_tags(tags),
            status,
            notes: notes.trim().to_string(),
        }
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Partial update for `update_item`; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ItemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// Make sure `reading_list` and `user_name` exist
///
/// Writes only the missing keys; when both are present no delta is applied.
pub fn ensure_initialized<S: StateAccess + ?Sized>(state: &S) -> Result<()> {
    let delta = missing_keys(state);
    if delta.is_empty() {
        return Ok(());
    }
    state.apply_delta(delta)
}

/// Store the user's display name, returning `(old, new)`
pub fn set_user_name<S: StateAccess + ?Sized>(state: &S, name: &str) -> Result<(String, String)> {
    let old = match state.get(USER_NAME_KEY) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    let new = name.trim().to_string();

    let mut delta = missing_keys(state);
    delta.insert(USER_NAME_KEY, new.clone());
    state.apply_delta(delta)?;
    Ok((old, new))
}

/// Append a new item, returning it with its 1-based position
pub fn add_item<S, I, T>(
    state: &S,
    title: &str,
    url: &str,
    tags: I,
    status: Option<&str>,
    notes: &str,
) -> Result<(ReadingListItem, usize)>
where
    S: StateAccess + ?Sized,
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut items = load_items(state)?;
    let item = ReadingListItem::new(title, url, tags, status, notes);
    items.push(item.clone());
    let position = items.len();
    store_items(state, &items)?;

    tracing::debug!(position, title = %item.title, "Reading list item added");
    Ok((item, position))
}

/// Items matching every given filter, in list order
///
/// An empty filter string counts as no filter. A status filter that is
/// not a known status matches nothing.
pub fn list_items<S: StateAccess + ?Sized>(
    state: &S,
    filter_status: Option<&str>,
    filter_tag: Option<&str>,
) -> Result<Vec<ReadingListItem>> {
    let filter_status = filter_status.filter(|s| !s.is_empty());
    let filter_tag = filter_tag.filter(|t| !t.is_empty());

    let items = load_items(state)?
        .into_iter()
        .filter(|item| match filter_status {
            Some(s) => ItemStatus::parse(s) == Some(item.status),
            None => true,
        })
        .filter(|item| filter_tag.map_or(true, |t| item.has_tag(t)))
        .collect();
    Ok(items)
}

/// Apply a partial update to the item at `position`, returning `(before, after)`
///
/// A blank title keeps the current title and an unknown status keeps the
/// current status; the remaining fields of the same update still apply.
pub fn update_item<S: StateAccess + ?Sized>(
    state: &S,
    position: usize,
    update: ItemUpdate,
) -> Result<(ReadingListItem, ReadingListItem)> {
    let mut items = load_items(state)?;
    let index = check_position(position, items.len())?;

    let before = items[index].clone();
    let item = &mut items[index];

    if let Some(title) = update.title {
        let title = title.trim();
        if !title.is_empty() {
            item.title = title.to_string();
        }
    }
    if let Some(url) = update.url {
        item.url = url.trim().to_string();
    }
    if let Some(status) = update.status {
        match ItemStatus::parse(&status) {
            Some(parsed) => item.status = parsed,
            None => {
                tracing::warn!(position, status = %status, "Ignoring unknown item status");
            }
        }
    }
    if let Some(notes) = update.notes {
        item.notes = notes.trim().to_string();
    }
    if let Some(tags) = update.tags {
        item.tags = normalize_tags(tags);
    }

    let after = item.clone();
    store_items(state, &items)?;
    Ok((before, after))
}

/// Replace the notes of the item at `position`, returning `(old, new)`
pub fn annotate_item<S: StateAccess + ?Sized>(
    state: &S,
    position: usize,
    notes: &str,
) -> Result<(String, String)> {
    let mut items = load_items(state)?;
    let index = check_position(position, items.len())?;

    let new_notes = notes.trim().to_string();
    let old_notes = std::mem::replace(&mut items[index].notes, new_notes.clone());
    store_items(state, &items)?;
    Ok((old_notes, new_notes))
}

/// Remove and return the item at `position`; later items shift down
pub fn remove_item<S: StateAccess + ?Sized>(state: &S, position: usize) -> Result<ReadingListItem> {
    let mut items = load_items(state)?;
    let index = check_position(position, items.len())?;

    let removed = items.remove(index);
    store_items(state, &items)?;

    tracing::debug!(position, title = %removed.title, remaining = items.len(), "Reading list item removed");
    Ok(removed)
}

/// Human-readable dump of the user name and reading list
pub fn render_state(label: &str, snapshot: &StateMap) -> String {
    let mut out = format!("{} {} {}\n", "-".repeat(12), label, "-".repeat(12));

    let user_name = snapshot
        .get(USER_NAME_KEY)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown");
    out.push_str(&format!("User: {}\n", user_name));

    let items = snapshot
        .get(READING_LIST_KEY)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());
    match items {
        None => out.push_str("Reading List: [empty]\n"),
        Some(items) => {
            out.push_str("Reading List:\n");
            for (i, item) in items.iter().enumerate() {
                let text = |name: &'static str| item.get(name).and_then(Value::as_str);
                let title = text("title").unwrap_or(UNTITLED);
                let status = text("status").unwrap_or("queued");
                let url = text("url").unwrap_or("");
                let notes = text("notes").unwrap_or("");
                let tags = item
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();

                out.push_str(&format!("  {}. {}  [{}]\n", i + 1, title, status));
                if !url.is_empty() {
                    out.push_str(&format!("     URL: {}\n", url));
                }
                if !tags.is_empty() {
                    out.push_str(&format!("     Tags: {}\n", tags));
                }
                if !notes.is_empty() {
                    out.push_str(&format!("     Notes: {}\n", notes));
                }
            }
        }
    }

    out.push_str(&"-".repeat(26 + label.len()));
    out
}

fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn check_position(position: usize, len: usize) -> Result<usize> {
    if position == 0 || position > len {
        tracing::warn!(position, len, "No reading list item at position");
        return Err(StateError::NotFound { position, len });
    }
    Ok(position - 1)
}

fn missing_keys<S: StateAccess + ?Sized>(state: &S) -> StateDelta {
    let mut delta = StateDelta::new();
    if state.get(READING_LIST_KEY).map_or(true, |v| v.is_null()) {
        delta.insert(READING_LIST_KEY, Value::Array(Vec::new()));
    }
    if state.get(USER_NAME_KEY).map_or(true, |v| v.is_null()) {
        delta.insert(USER_NAME_KEY, "");
    }
    delta
}

fn load_items<S: StateAccess + ?Sized>(state: &S) -> Result<Vec<ReadingListItem>> {
    match state.get(READING_LIST_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

fn store_items<S: StateAccess + ?Sized>(state: &S, items: &[ReadingListItem]) -> Result<()> {
    let mut delta = missing_keys(state);
    delta.insert(READING_LIST_KEY, serde_json::to_value(items)?);
    state.apply_delta(delta)
}
