//! SQLite event store implementation.

use crate::{Error, Event, Result, SessionId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite-backed event store.
pub struct EventStore {
    conn: Connection,
}

/// One row of [`EventStore::list_sessions`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    /// Task text from the session start event, if one was recorded.
    pub task: Option<String>,
    pub started_at: DateTime<Utc>,
    /// `None` while the session is running or if it was interrupted.
    pub ended_at: Option<DateTime<Utc>>,
    pub tool_calls: usize,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON events(session_id, timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Append an event to the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, session_id, timestamp, kind, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.session_id.to_string(),
                format_timestamp(&event.timestamp),
                event.kind.name(),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(())
    }

    /// Load all events for a session, oldest first.
    pub fn load_session(&self, session_id: SessionId) -> Result<Vec<Event>> {
        self.load_events(session_id, None)
    }

    /// Load a session's events, optionally only those of one kind
    /// (see [`EventKind::NAMES`](crate::EventKind::NAMES)).
    pub fn load_events(&self, session_id: SessionId, kind: Option<&str>) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, timestamp, data FROM events
             WHERE session_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY timestamp, rowid",
        )?;

        let events = stmt
            .query_map(params![session_id.to_string(), kind], |row| {
                let id: String = row.get(0)?;
                let session_id: String = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let data: String = row.get(3)?;
                Ok((id, session_id, timestamp, data))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, session_id, timestamp, data)| {
                Some(Event {
                    id: id.parse().ok()?,
                    session_id: session_id.parse().ok()?,
                    timestamp: timestamp.parse().ok()?,
                    kind: serde_json::from_str(&data).ok()?,
                })
            })
            .collect();

        Ok(events)
    }

    /// Summaries of every recorded session, newest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id,
                    MIN(timestamp),
                    MAX(CASE WHEN kind = 'session_end' THEN timestamp END),
                    MAX(CASE WHEN kind = 'session_start' THEN json_extract(data, '$.task') END),
                    SUM(kind = 'tool_call')
             FROM events
             GROUP BY session_id
             ORDER BY MIN(timestamp) DESC, MIN(rowid) DESC",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let started_at: String = row.get(1)?;
                let ended_at: Option<String> = row.get(2)?;
                let task: Option<String> = row.get(3)?;
                let tool_calls: i64 = row.get(4)?;
                Ok((id, started_at, ended_at, task, tool_calls))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, started_at, ended_at, task, tool_calls)| {
                Some(SessionSummary {
                    id: id.parse().ok()?,
                    task,
                    started_at: started_at.parse().ok()?,
                    ended_at: ended_at.and_then(|t| t.parse().ok()),
                    tool_calls: usize::try_from(tool_calls).unwrap_or(0),
                })
            })
            .collect();

        Ok(sessions)
    }

    /// Finds the one session whose id starts with `prefix`.
    pub fn resolve_session(&self, prefix: &str) -> Result<SessionId> {
        let prefix = prefix.trim().to_ascii_lowercase();
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT session_id FROM events
             WHERE substr(session_id, 1, length(?1)) = ?1",
        )?;
        let ids: Vec<String> = stmt
            .query_map([&prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        match ids.as_slice() {
            [] => Err(Error::NotFound(format!("session {prefix}"))),
            [id] => id
                .parse()
                .map_err(|_| Error::NotFound(format!("session {prefix}"))),
            _ => Err(Error::Ambiguous {
                prefix,
                count: ids.len(),
            }),
        }
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, Role};
    use chrono::Duration;
    use serde_json::json;

    fn at(session_id: SessionId, offset_secs: i64, kind: EventKind) -> Event {
        let mut event = Event::new(session_id, kind);
        event.timestamp = DateTime::from_timestamp(1_700_000_000, 0).unwrap()
            + Duration::seconds(offset_secs);
        event
    }

    fn record_run(store: &EventStore, offset: i64, task: &str, calls: usize) -> SessionId {
        let id = SessionId::new();
        store
            .append(&at(id, offset, EventKind::SessionStart { task: task.into() }))
            .unwrap();
        for i in 0..calls {
            store
                .append(&at(
                    id,
                    offset + 1 + i as i64,
                    EventKind::ToolCall {
                        name: "hover".into(),
                        input: json!({}),
                    },
                ))
                .unwrap();
        }
        id
    }

    #[test]
    fn load_session_returns_events_in_order() {
        let store = EventStore::in_memory().unwrap();
        let id = SessionId::new();
        let events = [
            Event::new(id, EventKind::SessionStart { task: "fly".into() }),
            Event::message(id, Role::User, "take off"),
            Event::tool_call(id, "takeoff", json!({"timeout_sec": 10})),
            Event::tool_result(id, "takeoff", json!(null), true),
        ];
        for event in &events {
            store.append(event).unwrap();
        }
        store
            .append(&Event::message(SessionId::new(), Role::User, "other run"))
            .unwrap();

        let loaded = store.load_session(id).unwrap();
        assert_eq!(loaded.len(), 4);
        for (loaded, original) in loaded.iter().zip(&events) {
            assert_eq!(loaded.id, original.id);
            assert_eq!(loaded.kind, original.kind);
        }
    }

    #[test]
    fn same_timestamp_keeps_insertion_order() {
        let store = EventStore::in_memory().unwrap();
        let id = SessionId::new();
        for step in 0..5 {
            store
                .append(&at(id, 0, EventKind::Plan { text: format!("step {step}") }))
                .unwrap();
        }
        let texts: Vec<_> = store
            .load_session(id)
            .unwrap()
            .into_iter()
            .map(|e| match e.kind {
                EventKind::Plan { text } => text,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(texts, ["step 0", "step 1", "step 2", "step 3", "step 4"]);
    }

    #[test]
    fn load_events_filters_by_kind() {
        let store = EventStore::in_memory().unwrap();
        let id = record_run(&store, 0, "scan", 3);
        store
            .append(&at(id, 10, EventKind::SessionEnd { steps: 3 }))
            .unwrap();

        assert_eq!(store.load_events(id, Some("tool_call")).unwrap().len(), 3);
        assert_eq!(store.load_events(id, Some("session_end")).unwrap().len(), 1);
        assert!(store.load_events(id, Some("status")).unwrap().is_empty());
        assert_eq!(store.load_events(id, None).unwrap().len(), 5);
    }

    #[test]
    fn list_sessions_newest_first() {
        let store = EventStore::in_memory().unwrap();
        let older = record_run(&store, 0, "survey the field", 2);
        let newer = record_run(&store, 100, "land on the roof", 0);
        store
            .append(&at(older, 50, EventKind::SessionEnd { steps: 2 }))
            .unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);

        assert_eq!(sessions[0].id, newer);
        assert_eq!(sessions[0].task.as_deref(), Some("land on the roof"));
        assert_eq!(sessions[0].tool_calls, 0);
        assert_eq!(sessions[0].ended_at, None);

        assert_eq!(sessions[1].id, older);
        assert_eq!(sessions[1].tool_calls, 2);
        assert_eq!(
            sessions[1].ended_at,
            Some(DateTime::from_timestamp(1_700_000_050, 0).unwrap())
        );
    }

    #[test]
    fn resolve_session_by_prefix() {
        let store = EventStore::in_memory().unwrap();
        let id = record_run(&store, 0, "fly", 0);
        let full = id.to_string();

        assert_eq!(store.resolve_session(&full[..8]).unwrap(), id);
        assert_eq!(store.resolve_session(&full.to_uppercase()).unwrap(), id);
        assert!(matches!(
            store.resolve_session("zzzz"),
            Err(Error::NotFound(_))
        ));

        record_run(&store, 10, "again", 0);
        assert!(matches!(
            store.resolve_session(""),
            Err(Error::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flightlog.db");
        let id = {
            let store = EventStore::open(&path).unwrap();
            record_run(&store, 0, "persist", 1)
        };

        let store = EventStore::open(&path).unwrap();
        let events = store.load_session(id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].kind,
            EventKind::SessionStart {
                task: "persist".into()
            }
        );
    }
}
