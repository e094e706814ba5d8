//! The multi-step conversation driver.

use crate::agent::Agent;
use crate::model::Backend;
use crate::outcome::StepOutcome;
use crate::prompt;
use tracing::info;

impl<B: Backend> Agent<B> {
    /// Runs up to `max_steps` steps towards `input`.
    ///
    /// Only the first step gets the live camera view; later steps get a
    /// summary of the previous result plus any images it produced. Stops
    /// early when a step calls no tool or fails. Returns every step outcome
    /// in order.
    pub async fn chat(&self, input: &str, max_steps: usize) -> Vec<StepOutcome> {
        let mut history: Vec<StepOutcome> = Vec::new();
        let mut current_input = input.to_string();

        for step in 0..max_steps {
            let images = history
                .last()
                .map(StepOutcome::produced_images)
                .unwrap_or_default();

            let outcome = self.step(&current_input, step == 0, &images).await;
            info!(
                step,
                tool = outcome.tool_name(),
                success = outcome.success(),
                "step finished"
            );

            let finished = outcome.tool_name().is_none() || !outcome.success();
            if !finished {
                current_input = prompt::continuation_prompt(&outcome);
            }
            history.push(outcome);
            if finished {
                break;
            }
        }

        if let Some(last) = history.last() {
            let response = prompt::final_response(history.len(), last);
            self.notify(|o| o.add_assistant_response(&response));
        }

        history
    }
}
