//! The step executor.

use crate::logging::log_data;
use crate::model::{Backend, GenerateRequest, ImageRef, Message, Part};
use crate::observer::{LlmOutput, Observer, StatusSnapshot, ToolCallReport};
use crate::outcome::{CallRecord, ImageAttachment, StepOutcome};
use crate::parser::{ParsedResponse, parse_response};
use crate::prompt;
use crate::tools::{ToolRegistry, drone};
use serde_json::Value;
use sim::{DroneCamera, FlightApi};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Completion budget per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 400;

const NO_PARSED_CALL: &str = "could not parse a tool call";
const NO_TOOL_INVOKED: &str = "no tool invoked";
const EMPTY_TOOL_NAME: &str = "empty tool name in call list";

/// Drives one vehicle with one model.
///
/// Each [`step`](Agent::step) is a single model round-trip followed by the
/// requested tool calls, executed in order. [`chat`](Agent::chat) repeats
/// steps until the model stops calling tools.
pub struct Agent<B> {
    backend: B,
    drone: Arc<dyn FlightApi>,
    tools: ToolRegistry,
    observer: Option<Arc<dyn Observer>>,
    cameras: Vec<DroneCamera>,
    max_tokens: u32,
    response_schema: Option<Value>,
}

impl<B: Backend> Agent<B> {
    /// Creates an agent with the drone tool set registered.
    pub fn new(backend: B, drone: Arc<dyn FlightApi>) -> Self {
        let mut tools = ToolRegistry::new();
        drone::register(&mut tools, Arc::clone(&drone));

        Self {
            backend,
            drone,
            tools,
            observer: None,
            cameras: DroneCamera::ALL.to_vec(),
            max_tokens: DEFAULT_MAX_TOKENS,
            response_schema: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Asks the provider to constrain replies to `schema`.
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Mutable access for registering extra tools or stubbing existing ones.
    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn system_prompt(&self) -> String {
        prompt::system_prompt(&self.tools.list_tools_summary(), &self.cameras)
    }

    /// Runs one model round-trip and executes the tool calls it asks for.
    ///
    /// Failures are reported in the returned outcome, never as an error.
    pub async fn step(
        &self,
        input: &str,
        include_observation: bool,
        images: &[ImageAttachment],
    ) -> StepOutcome {
        let messages = self.build_messages(input, include_observation, images);

        let request = GenerateRequest {
            messages: &messages,
            json_schema: self.response_schema.as_ref(),
            max_tokens: self.max_tokens,
        };
        let generation = match self.backend.generate(request).await {
            Ok(generation) => generation,
            Err(e) => {
                error!(error = %e, "model request failed");
                return StepOutcome::ModelFailed {
                    error: e.to_string(),
                };
            }
        };
        log_data("model reply", &Value::String(generation.text.clone()));

        let parsed = parse_response(&generation.text);
        debug!(
            plan = parsed.plan.is_some(),
            tool_calls = parsed.tool_calls.len(),
            "parsed model reply"
        );
        self.notify(|o| {
            o.add_llm_output(&LlmOutput {
                plan: parsed.plan.as_deref(),
                tool_calls: &parsed.tool_calls,
                raw_response: &generation.text,
            })
        });

        self.execute(parsed, generation.text)
    }

    /// System prompt, status, instruction, live view, carried-over images.
    fn build_messages(
        &self,
        input: &str,
        include_observation: bool,
        images: &[ImageAttachment],
    ) -> Vec<Message> {
        let mut messages = vec![
            Message::system(self.system_prompt()),
            self.status_message(),
            Message::user(input),
        ];

        if include_observation {
            messages.push(self.observation_message(&[DroneCamera::FrontCenter]));
        }

        messages.extend(images.iter().map(|image| {
            Message::user_parts(vec![
                Part::Text(prompt::image_caption(&image.camera)),
                Part::Image(ImageRef::named(image.image_url.clone(), image.camera.clone())),
            ])
        }));

        messages
    }

    fn status_message(&self) -> Message {
        match self.drone.multirotor_state() {
            Ok(state) => {
                let snapshot = StatusSnapshot::from(&state);
                self.notify(|o| o.update_status(&snapshot));
                Message::user(prompt::status_text(&state))
            }
            Err(e) => {
                warn!(error = %e, "failed to read drone status");
                Message::user(prompt::STATUS_UNAVAILABLE)
            }
        }
    }

    fn observation_message(&self, cameras: &[DroneCamera]) -> Message {
        match self.drone.rgb_frames(cameras) {
            Ok(frames) if frames.len() == cameras.len() => {
                let mut parts = vec![Part::Text(prompt::observation_caption(cameras))];
                parts.extend(cameras.iter().zip(frames).map(|(camera, frame)| {
                    Part::Image(ImageRef::named(frame.to_data_url(), camera.name()))
                }));
                Message::user_parts(parts)
            }
            Ok(frames) => {
                warn!(expected = cameras.len(), got = frames.len(), "camera frame count mismatch");
                Message::user("Warning: could not capture camera images.")
            }
            Err(e) => {
                warn!(error = %e, "failed to capture camera images");
                Message::user(format!("Warning: could not capture camera images: {e}"))
            }
        }
    }

    /// Validates all calls, then executes them in order.
    fn execute(&self, parsed: ParsedResponse, llm_response: String) -> StepOutcome {
        let ParsedResponse { plan, tool_calls } = parsed;

        if tool_calls.is_empty() {
            return StepOutcome::NoAction {
                reason: NO_PARSED_CALL.to_string(),
                plan,
                tool_calls,
                llm_response,
            };
        }

        if let [only] = tool_calls.as_slice() {
            if only.tool_name.is_none() {
                let reason = only.reason.clone().unwrap_or_else(|| NO_TOOL_INVOKED.to_string());
                info!(%reason, "model declined to call a tool");
                return StepOutcome::NoAction {
                    reason,
                    plan,
                    tool_calls,
                    llm_response,
                };
            }
        }

        if tool_calls.iter().any(|call| call.tool_name.is_none()) {
            warn!("tool call list contains an unnamed call");
            return StepOutcome::Rejected {
                reason: EMPTY_TOOL_NAME.to_string(),
                plan,
                tool_calls,
                llm_response,
            };
        }
        let calls: Vec<_> = tool_calls
            .iter()
            .filter_map(|call| call.tool_name.as_deref().map(|name| (name, &call.arguments)))
            .collect();

        for &(name, arguments) in &calls {
            if let Err(e) = self.tools.validate_arguments(name, arguments) {
                warn!(tool = name, error = %e, "tool arguments rejected");
                return StepOutcome::Invalid {
                    tool_name: name.to_string(),
                    arguments: arguments.clone(),
                    error: e.to_string(),
                    plan,
                };
            }
        }

        let mut results = Vec::with_capacity(calls.len());
        for &(name, arguments) in &calls {
            match self.tools.call_tool(name, arguments) {
                Ok(result) => {
                    info!(tool = name, "tool call succeeded");
                    self.notify(|o| {
                        o.add_tool_call(&ToolCallReport {
                            tool_name: name,
                            arguments,
                            outcome: Ok(&result),
                            plan: plan.as_deref(),
                        })
                    });
                    results.push(CallRecord {
                        tool_name: name.to_string(),
                        arguments: arguments.clone(),
                        result,
                    });
                }
                Err(e) => {
                    error!(tool = name, error = %e, "tool call failed");
                    self.notify(|o| {
                        o.add_tool_call(&ToolCallReport {
                            tool_name: name,
                            arguments,
                            outcome: Err(&e),
                            plan: plan.as_deref(),
                        })
                    });
                    return StepOutcome::Failed {
                        tool_name: name.to_string(),
                        arguments: arguments.clone(),
                        error: e.to_string(),
                        tool_calls: tool_calls.clone(),
                        results,
                        plan,
                    };
                }
            }
        }

        if results.len() == 1 {
            if let Some(call) = results.pop() {
                return StepOutcome::Executed { call, plan };
            }
        }
        StepOutcome::Batch {
            tool_calls,
            results,
            plan,
        }
    }

    pub(crate) fn notify(&self, f: impl FnOnce(&dyn Observer)) {
        if let Some(observer) = &self.observer {
            f(observer.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, Role};
    use crate::outcome::{BATCH_TOOL_NAME, ErrorType};
    use crate::testing::{RecordingObserver, ScriptedBackend};
    use serde_json::json;
    use sim::{KinematicSim, Vec3};

    fn agent_with(replies: &[&str]) -> (Agent<ScriptedBackend>, Arc<KinematicSim>) {
        let sim = Arc::new(KinematicSim::new());
        let agent = Agent::new(ScriptedBackend::new(replies), sim.clone());
        (agent, sim)
    }

    #[tokio::test]
    async fn unparseable_reply_is_no_action() {
        let (agent, _) = agent_with(&["I am not sure what to do."]);
        let outcome = agent.step("look around", true, &[]).await;

        assert!(matches!(
            &outcome,
            StepOutcome::NoAction { reason, plan, .. }
                if reason == NO_PARSED_CALL && plan.as_deref() == Some("I am not sure what to do.")
        ));
        assert_eq!(outcome.tool_name(), None);
    }

    #[tokio::test]
    async fn explicit_decline_keeps_reason() {
        let (agent, _) = agent_with(&[r#"{"tool_name": null, "reason": "已到达目标"}"#]);
        let outcome = agent.step("go", true, &[]).await;
        assert_eq!(outcome.tool_name(), None);
        assert_eq!(outcome.reason(), Some("已到达目标"));

        let (agent, _) = agent_with(&[r#"{"tool_name": null}"#]);
        let outcome = agent.step("go", true, &[]).await;
        assert_eq!(outcome.reason(), Some(NO_TOOL_INVOKED));
    }

    #[tokio::test]
    async fn truncated_batch_runs_nothing() {
        let (agent, sim) = agent_with(&[r#"Arm and take off.
[{"tool_name": "arm", "arguments": {"armed": true}}, {"tool_name": "takeoff", "argu"#]);
        let outcome = agent.step("take off", false, &[]).await;

        assert_eq!(outcome.tool_name(), None);
        assert_eq!(outcome.reason(), Some(NO_PARSED_CALL));
        assert_eq!(outcome.plan(), Some("Arm and take off."));
        assert!(sim.command_log().is_empty());
    }

    #[tokio::test]
    async fn unnamed_call_in_list_rejects_everything() {
        let (agent, sim) = agent_with(&[
            r#"[{"tool_name": "arm", "arguments": {"armed": true}}, {"tool_name": null}]"#,
        ]);
        let outcome = agent.step("go", false, &[]).await;

        assert!(!outcome.success());
        assert_eq!(outcome.error(), Some(EMPTY_TOOL_NAME));
        assert_eq!(outcome.error_type(), None);
        assert!(sim.command_log().is_empty());
    }

    #[tokio::test]
    async fn validation_runs_before_any_execution() {
        let (agent, sim) = agent_with(&[
            r#"Plan
[{"tool_name": "arm", "arguments": {"armed": true}},
 {"tool_name": "move_to_position", "arguments": {"x": 1, "y": null}}]"#,
        ]);
        let outcome = agent.step("go", false, &[]).await;

        assert_eq!(outcome.error_type(), Some(ErrorType::MissingRequiredParameters));
        assert_eq!(outcome.tool_name(), Some("move_to_position"));
        assert_eq!(outcome.error(), Some("missing required parameters: y, z"));
        assert_eq!(outcome.plan(), Some("Plan"));
        assert!(sim.command_log().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_fails_validation() {
        let (agent, _) = agent_with(&[r#"{"tool_name": "barrel_roll", "arguments": {}}"#]);
        let outcome = agent.step("go", false, &[]).await;
        assert_eq!(outcome.error(), Some("unknown tool: barrel_roll"));
        assert_eq!(outcome.error_type(), Some(ErrorType::MissingRequiredParameters));
    }

    #[tokio::test]
    async fn single_call_collapses_to_plain_outcome() {
        let (agent, sim) = agent_with(&[r#"{"tool_name": "arm", "arguments": {"armed": true}}"#]);
        let outcome = agent.step("arm", false, &[]).await;

        assert!(outcome.success());
        assert_eq!(outcome.tool_name(), Some("arm"));
        assert_eq!(outcome.result(), Some(&Value::Null));
        assert_eq!(sim.command_log(), ["arm(true)"]);
    }

    #[tokio::test]
    async fn batch_executes_in_order() {
        let (agent, sim) = agent_with(&[r#"Arm, take off, climb.
[{"tool_name": "arm", "arguments": {"armed": true}},
 {"tool_name": "takeoff", "arguments": {}},
 {"tool_name": "move_to_z", "arguments": {"z": -10}}]"#]);
        let outcome = agent.step("climb to 10 m", false, &[]).await;

        assert!(outcome.success());
        assert_eq!(outcome.tool_name(), Some(BATCH_TOOL_NAME));
        assert_eq!(outcome.results().len(), 3);
        assert_eq!(outcome.tool_calls().len(), 3);
        assert_eq!(sim.vehicle_pose().unwrap().position, Vec3::new(0.0, 0.0, -10.0));
    }

    #[tokio::test]
    async fn execution_failure_stops_batch() {
        let (agent, sim) = agent_with(&[r#"[
  {"tool_name": "arm", "arguments": {"armed": true}},
  {"tool_name": "takeoff", "arguments": {}},
  {"tool_name": "hover", "arguments": {}}
]"#]);
        sim.fail_next("takeoff", "motor fault");
        let outcome = agent.step("go", false, &[]).await;

        assert!(!outcome.success());
        assert_eq!(outcome.error_type(), Some(ErrorType::ExecutionError));
        assert_eq!(outcome.tool_name(), Some("takeoff"));
        assert_eq!(outcome.results().len(), 1);
        assert_eq!(outcome.results()[0].tool_name, "arm");
        assert!(outcome.error().unwrap().contains("motor fault"));
        assert!(!sim.command_log().iter().any(|c| c.starts_with("hover")));
    }

    #[tokio::test]
    async fn model_failure_is_reported_as_outcome() {
        let sim = Arc::new(KinematicSim::new());
        let backend = ScriptedBackend::from_results(vec![Err(ModelError::Network(
            "connection refused".into(),
        ))]);
        let agent = Agent::new(backend, sim);

        let outcome = agent.step("go", true, &[]).await;
        assert_eq!(outcome.error_type(), Some(ErrorType::ModelError));
        assert_eq!(outcome.error(), Some("network: connection refused"));
        assert_eq!(outcome.tool_name(), None);
    }

    #[tokio::test]
    async fn request_layout_with_observation() {
        let (agent, _) = agent_with(&[r#"{"tool_name": null}"#]);
        agent.step("take off", true, &[]).await;

        let requests = agent.backend().requests();
        let messages = &requests[0];
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].text().contains("- arm: Arm or disarm the motors (required: armed)"));
        assert!(messages[1].text().starts_with("Current drone status:"));
        assert_eq!(messages[2].text(), "take off");
        assert_eq!(messages[3].images().len(), 1);
        assert_eq!(messages[3].images()[0].name.as_deref(), Some("FRONT_CENTER"));
    }

    #[tokio::test]
    async fn request_layout_with_carried_images() {
        let (agent, _) = agent_with(&[r#"{"tool_name": null}"#]);
        let images = [ImageAttachment {
            camera: "BACK_CENTER".into(),
            image_url: "data:image/png;base64,AAAA".into(),
        }];
        agent.step("continue", false, &images).await;

        let requests = agent.backend().requests();
        let messages = &requests[0];
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].text(), "Image from the BACK_CENTER camera:");
        assert_eq!(messages[3].images()[0].url, "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn status_failure_degrades_to_warning() {
        struct Broken;
        impl FlightApi for Broken {
            fn arm(&self, _: bool) -> sim::Result<()> {
                Ok(())
            }
            fn takeoff(&self, _: std::time::Duration) -> sim::Result<()> {
                Ok(())
            }
            fn land(&self, _: std::time::Duration) -> sim::Result<()> {
                Ok(())
            }
            fn hover(&self) -> sim::Result<()> {
                Ok(())
            }
            fn move_to_position(&self, _: Vec3, _: f64, _: std::time::Duration) -> sim::Result<()> {
                Ok(())
            }
            fn move_to_z(&self, _: f64, _: f64, _: std::time::Duration) -> sim::Result<()> {
                Ok(())
            }
            fn move_on_path(&self, _: &[Vec3], _: f64, _: std::time::Duration) -> sim::Result<()> {
                Ok(())
            }
            fn rgb_frame(&self, _: DroneCamera) -> sim::Result<sim::ImageFrame> {
                Err(sim::FlightError::Unavailable)
            }
            fn multirotor_state(&self) -> sim::Result<sim::MultirotorState> {
                Err(sim::FlightError::Unavailable)
            }
            fn vehicle_pose(&self) -> sim::Result<sim::Pose> {
                Err(sim::FlightError::Unavailable)
            }
            fn collision_info(&self) -> sim::Result<sim::CollisionInfo> {
                Err(sim::FlightError::Unavailable)
            }
        }

        let agent = Agent::new(ScriptedBackend::new(&[r#"{"tool_name": "hover"}"#]), Arc::new(Broken));
        let outcome = agent.step("hover", true, &[]).await;
        assert!(outcome.success());

        let requests = agent.backend().requests();
        assert_eq!(requests[0][1].text(), prompt::STATUS_UNAVAILABLE);
        assert!(requests[0][3].text().starts_with("Warning: could not capture camera images"));
    }

    #[tokio::test]
    async fn observer_sees_plan_calls_and_status() {
        let observer = Arc::new(RecordingObserver::default());
        let (agent, _) = agent_with(&[r#"Arm then fail.
[{"tool_name": "arm", "arguments": {"armed": true}}, {"tool_name": "hover", "arguments": {}}]"#]);
        let agent = agent.with_observer(observer.clone());

        agent.step("go", false, &[]).await;

        assert_eq!(
            observer.events(),
            [
                "status z=0",
                "llm plan=Arm then fail. calls=2",
                "tool arm ok",
                "tool hover err: tool hover failed: vehicle is not airborne",
            ]
        );
    }

    #[tokio::test]
    async fn stubbed_tool_overrides_binding() {
        let (mut agent, sim) = agent_with(&[r#"{"tool_name": "takeoff"}"#]);
        agent
            .tools_mut()
            .register("takeoff", "Stub", json!({"type": "object"}), |_| Ok(json!("stubbed")));

        let outcome = agent.step("go", false, &[]).await;
        assert_eq!(outcome.result(), Some(&json!("stubbed")));
        assert!(sim.command_log().is_empty());
    }
}
