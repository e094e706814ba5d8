//! Notifications about agent progress, for UIs and flight logs.

use crate::tools::{Arguments, ToolCallRequest, ToolError};
use serde::Serialize;
use serde_json::Value;
use sim::{MultirotorState, Quaternion, Vec3};
use tracing::{info, warn};

/// Parsed model reply.
#[derive(Debug, Clone, Copy)]
pub struct LlmOutput<'a> {
    pub plan: Option<&'a str>,
    pub tool_calls: &'a [ToolCallRequest],
    pub raw_response: &'a str,
}

/// A tool call that finished, successfully or not.
#[derive(Debug, Clone, Copy)]
pub struct ToolCallReport<'a> {
    pub tool_name: &'a str,
    pub arguments: &'a Arguments,
    pub outcome: Result<&'a Value, &'a ToolError>,
    pub plan: Option<&'a str>,
}

/// Vehicle status sent to the model at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quaternion,
}

impl From<&MultirotorState> for StatusSnapshot {
    fn from(state: &MultirotorState) -> Self {
        Self {
            position: state.kinematics.position,
            velocity: state.kinematics.linear_velocity,
            orientation: state.kinematics.orientation,
        }
    }
}

/// Receives progress notifications from the agent.
///
/// Notifications are informational; the agent never reads anything back.
/// Implementations guard their own state, since they may be read from
/// another thread.
pub trait Observer: Send + Sync {
    fn add_llm_output(&self, _output: &LlmOutput<'_>) {}

    fn add_tool_call(&self, _report: &ToolCallReport<'_>) {}

    fn update_status(&self, _status: &StatusSnapshot) {}

    fn add_assistant_response(&self, _text: &str) {}
}

/// Observer that writes every notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn add_llm_output(&self, output: &LlmOutput<'_>) {
        info!(
            plan = output.plan.unwrap_or(""),
            tool_calls = output.tool_calls.len(),
            "model output"
        );
    }

    fn add_tool_call(&self, report: &ToolCallReport<'_>) {
        match report.outcome {
            Ok(_) => info!(tool = report.tool_name, "tool call succeeded"),
            Err(e) => warn!(tool = report.tool_name, error = %e, "tool call failed"),
        }
    }

    fn update_status(&self, status: &StatusSnapshot) {
        info!(
            x = status.position.x,
            y = status.position.y,
            z = status.position.z,
            "status"
        );
    }

    fn add_assistant_response(&self, text: &str) {
        info!("{text}");
    }
}
