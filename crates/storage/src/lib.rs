//! SQLite-backed flight log for drone agent runs.
//!
//! Every agent run is a session. The log records what the model was told,
//! what it planned, every tool call with its result, and the vehicle status
//! sent at each step, so a run can be replayed with `drone-agent logs`.
//!
//! # Core Concepts
//!
//! ## EventStore
//!
//! The [`EventStore`] wraps a SQLite database. It appends events and answers
//! per-session queries, including a kind filter and a session listing.
//!
//! ## EventKind
//!
//! - `SessionStart` / `SessionEnd`: run lifecycle, with the task and step count
//! - `Message` / `Plan`: conversation text and the model's plan
//! - `ToolCall` / `ToolResult`: tool invocations and their results
//! - `Status`: vehicle status snapshots
//!
//! ## SessionId
//!
//! A [`SessionId`] is a UUID. CLI commands accept any unique prefix of it,
//! resolved through [`EventStore::resolve_session`].
//!
//! # Example
//!
//! ```no_run
//! use storage::{EventStore, Event, EventKind, Role, SessionId};
//! use serde_json::json;
//!
//! let store = EventStore::open("flightlog.db")?;
//!
//! let session_id = SessionId::new();
//! store.append(&Event::new(session_id, EventKind::SessionStart { task: "climb to 10 m".into() }))?;
//! store.append(&Event::message(session_id, Role::User, "climb to 10 m"))?;
//! store.append(&Event::tool_call(session_id, "move_to_z", json!({"z": -10})))?;
//!
//! for event in store.load_events(session_id, Some("tool_call"))? {
//!     println!("{}: {:?}", event.timestamp, event.kind);
//! }
//!
//! for summary in store.list_sessions()? {
//!     println!("{}: {} tool calls", summary.id, summary.tool_calls);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod event;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind, Role, SessionId};
pub use store::{EventStore, SessionSummary};
