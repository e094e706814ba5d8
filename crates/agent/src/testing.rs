//! Test doubles for the model backend and the observer.

use crate::model::{Backend, GenerateRequest, Generation, Message, ModelError};
use crate::observer::{LlmOutput, Observer, StatusSnapshot, ToolCallReport};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Backend that replays canned replies and records every request.
///
/// The last reply repeats once the script runs out.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    last: Mutex<Option<Result<String, ModelError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(replies: &[&str]) -> Self {
        Self::from_results(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn repeating(reply: &str) -> Self {
        Self::new(&[reply])
    }

    pub fn from_results(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Message lists of every request so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<String, ModelError> {
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            *last = Some(reply);
        }
        (*last)
            .clone()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script is empty".into())))
    }
}

impl Backend for ScriptedBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, ModelError> {
        self.requests.lock().unwrap().push(request.messages.to_vec());
        let text = self.next_reply()?;
        Ok(Generation::from_text(text))
    }
}

/// Observer that keeps a one-line summary of every notification.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Observer for RecordingObserver {
    fn add_llm_output(&self, output: &LlmOutput<'_>) {
        self.push(format!(
            "llm plan={} calls={}",
            output.plan.unwrap_or(""),
            output.tool_calls.len()
        ));
    }

    fn add_tool_call(&self, report: &ToolCallReport<'_>) {
        match report.outcome {
            Ok(_) => self.push(format!("tool {} ok", report.tool_name)),
            Err(e) => self.push(format!("tool {} err: {e}", report.tool_name)),
        }
    }

    fn update_status(&self, status: &StatusSnapshot) {
        self.push(format!("status z={}", status.position.z));
    }

    fn add_assistant_response(&self, text: &str) {
        self.push(format!("assistant {text}"));
    }
}
