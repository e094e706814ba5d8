//! Flight log recording.

use agent::{LlmOutput, Observer, StatusSnapshot, ToolCallReport, TracingObserver};
use serde_json::Value;
use std::sync::Mutex;
use storage::{Event, EventKind, EventStore, Role, SessionId};
use tracing::warn;

/// Observer that writes every notification to the flight log and the
/// tracing log.
pub struct EventLogObserver {
    store: Mutex<EventStore>,
    session: SessionId,
    log: TracingObserver,
}

impl EventLogObserver {
    /// Opens a new session for `task`.
    pub fn start(store: EventStore, task: &str) -> storage::Result<Self> {
        let session = SessionId::new();
        store.append(&Event::new(
            session,
            EventKind::SessionStart {
                task: task.to_string(),
            },
        ))?;
        store.append(&Event::message(session, Role::User, task))?;

        Ok(Self {
            store: Mutex::new(store),
            session,
            log: TracingObserver,
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Closes the session after `steps` steps.
    pub fn finish(&self, steps: usize) -> storage::Result<()> {
        self.with_store(|store| {
            store.append(&Event::new(self.session, EventKind::SessionEnd { steps }))
        })
        .unwrap_or(Ok(()))
    }

    fn record(&self, kind: EventKind) {
        let event = Event::new(self.session, kind);
        if let Some(Err(e)) = self.with_store(|store| store.append(&event)) {
            warn!(error = %e, kind = event.kind.name(), "failed to write flight log");
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&EventStore) -> T) -> Option<T> {
        match self.store.lock() {
            Ok(store) => Some(f(&store)),
            Err(_) => {
                warn!("flight log lock poisoned");
                None
            }
        }
    }
}

impl Observer for EventLogObserver {
    fn add_llm_output(&self, output: &LlmOutput<'_>) {
        self.log.add_llm_output(output);
        self.record(EventKind::Message {
            role: Role::Assistant,
            content: output.raw_response.to_string(),
        });
        if let Some(plan) = output.plan {
            self.record(EventKind::Plan {
                text: plan.to_string(),
            });
        }
    }

    fn add_tool_call(&self, report: &ToolCallReport<'_>) {
        self.log.add_tool_call(report);
        self.record(EventKind::ToolCall {
            name: report.tool_name.to_string(),
            input: Value::Object(report.arguments.clone()),
        });
        let (output, success) = match report.outcome {
            Ok(result) => (result.clone(), true),
            Err(e) => (Value::String(e.to_string()), false),
        };
        self.record(EventKind::ToolResult {
            name: report.tool_name.to_string(),
            output,
            success,
        });
    }

    fn update_status(&self, status: &StatusSnapshot) {
        self.log.update_status(status);
        match serde_json::to_value(status) {
            Ok(snapshot) => self.record(EventKind::Status { snapshot }),
            Err(e) => warn!(error = %e, "failed to serialize status"),
        }
    }

    fn add_assistant_response(&self, text: &str) {
        self.log.add_assistant_response(text);
        self.record(EventKind::Message {
            role: Role::Assistant,
            content: text.to_string(),
        });
    }
}
