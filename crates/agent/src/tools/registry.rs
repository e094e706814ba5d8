use super::{Arguments, Binding, BindingError, ToolError, ToolSpec};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Tool definitions keyed by name, kept in registration order.
///
/// Registering an existing name replaces the previous definition in place,
/// which lets tests stub individual tools.
#[derive(Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    bindings: Vec<Binding>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the tool called `name`.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        binding: F,
    ) where
        F: Fn(&Arguments) -> Result<Value, BindingError> + Send + Sync + 'static,
    {
        let spec = ToolSpec {
            name: name.into(),
            description: description.into(),
            schema,
        };
        let binding: Binding = Box::new(binding);

        match self.position(&spec.name) {
            Some(index) => {
                debug!(tool = %spec.name, "replacing tool");
                self.specs[index] = spec;
                self.bindings[index] = binding;
            }
            None => {
                self.specs.push(spec);
                self.bindings.push(binding);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.position(name).map(|index| &self.specs[index])
    }

    /// All tool specifications in registration order.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Checks that every required parameter is present and not null.
    ///
    /// Optional parameters and unknown keys are not inspected here.
    pub fn validate_arguments(&self, name: &str, arguments: &Arguments) -> Result<(), ToolError> {
        let spec = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let missing: Vec<String> = spec
            .required()
            .into_iter()
            .filter(|param| arguments.get(*param).is_none_or(Value::is_null))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToolError::MissingParameters {
                tool: name.to_string(),
                missing,
            })
        }
    }

    /// Validates `arguments` and runs the tool's binding.
    pub fn call_tool(&self, name: &str, arguments: &Arguments) -> Result<Value, ToolError> {
        let index = self
            .position(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        self.validate_arguments(name, arguments)?;

        (self.bindings[index])(arguments).map_err(|source| ToolError::Execution {
            tool: name.to_string(),
            source,
        })
    }

    /// One line per tool, compact enough for a system prompt.
    pub fn list_tools_summary(&self) -> String {
        self.specs
            .iter()
            .map(|spec| {
                let required = spec.required();
                let params = if required.is_empty() {
                    "no required params".to_string()
                } else {
                    format!("required: {}", required.join(", "))
                };
                format!("- {}: {} ({params})", spec.name, spec.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.name == name)
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.specs.iter().map(|s| &s.name).collect::<Vec<_>>())
            .finish()
    }
}
