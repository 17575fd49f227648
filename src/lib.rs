//! # a3s-state
//!
//! Namespaced, event-driven session state for A3S agents.
//!
//! ## Overview
//!
//! `a3s-state` keeps the key/value state an agent reads and writes while
//! handling a conversation. Keys are namespaced by prefix:
//!
//! - no prefix: session state, lives as long as the session
//! - `user:`: shared by every session of the same user
//! - `temp:`: discarded by the next delta application, never persisted
//!
//! State changes only through deltas. A session service logs each delta
//! as a timestamped `StateEvent` and persists everything but `temp:` keys.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_state::reading_list::{add_item, list_items};
//! use a3s_state::{MemorySessionService, SessionService, StateMap};
//!
//! # async fn example() -> a3s_state::Result<()> {
//! let service = MemorySessionService::new();
//! let (mut session, _created) = service
//!     .find_or_create_session("curator", "demo_user", StateMap::new())
//!     .await?;
//!
//! // Buffer one turn's writes, then commit them as a single event
//! let turn = session.turn();
//! add_item(&turn, "Clean Code", "", ["craft"], None, "")?;
//! if let Some(event) = turn.into_event("reading_list_curator") {
//!     service.append_event(&mut session, event).await?;
//! }
//!
//! let items = list_items(session.state(), None, None)?;
//! assert_eq!(items.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **StateStore**: live namespaced state with atomic delta application
//! - **StateAccess** trait: read/apply seam shared by the store and turns
//! - **SessionService** trait: session persistence backends (memory, file)
//! - **reading_list**: positional CRUD over the `reading_list` key

pub mod config;
pub mod error;
pub mod reading_list;
pub mod session;
pub mod state;
pub mod types;

pub use config::StateConfig;
pub use error::{Result, StateError};
pub use session::file::FileSessionService;
pub use session::memory::MemorySessionService;
pub use session::{Session, SessionInfo, SessionService, TurnContext};
pub use state::{StateAccess, StateStore};
pub use types::{Scope, StateDelta, StateEvent, StateMap, TEMP_PREFIX, USER_PREFIX};
