//! Tool trait and metadata definitions
//!
//! Tools are the only way the agent touches anything outside the model.
//! Each tool declares its name, parameters, and execution logic.

use super::result::{ToolError, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Tool metadata for LLM-friendly discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique within a registry)
    pub name: String,

    /// Human-readable description, sent to the model verbatim
    pub description: String,

    /// What the tool returns
    pub returns: String,

    /// Tags for categorization
    pub tags: Vec<String>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            returns: "Tool-specific result".to_string(),
            tags: Vec::new(),
        }
    }

    /// Set return description
    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// JSON Schema for input parameters
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a schema from a JSON Schema value
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }

    /// Schema for a tool taking a single required string argument
    pub fn single_string(field: &str, description: &str) -> Self {
        Self::new(serde_json::json!({
            "type": "object",
            "properties": {
                field: { "type": "string", "description": description }
            },
            "required": [field],
            "additionalProperties": false
        }))
    }

    /// Create an empty schema (tool takes no parameters)
    pub fn empty() -> Self {
        Self::new(serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }))
    }
}

/// The provider-facing view of a tool: what the model is told it may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.schema().parameters,
        }
    }
}

/// Context provided to tool execution
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Run ID for correlation across a batch
    pub run_id: Option<String>,

    /// Provider-assigned id of the tool call being served
    pub call_id: Option<String>,
}

impl ToolExecutionContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set run ID
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set call ID
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }
}

/// Core tool trait
///
/// Implement this trait to create a tool the agent can call.
/// The runtime calls `validate` before `execute` and converts any error into
/// a failed tool result instead of aborting the agent run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Get tool name (convenience method)
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Get tool description (convenience method)
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Get the JSON schema for this tool's parameters
    fn schema(&self) -> ToolSchema;

    /// Validate input arguments before execution
    ///
    /// Default implementation performs no validation.
    fn validate(&self, _args: &Value) -> Result<(), Vec<ValidationError>> {
        Ok(())
    }

    /// Execute the tool with given arguments
    async fn execute(&self, args: Value, ctx: &ToolExecutionContext) -> Result<Value, ToolError>;
}

/// Type alias for boxed tools
pub type BoxedTool = Arc<dyn Tool>;

/// Pull a required string field out of tool arguments.
///
/// Models sometimes send the bare string instead of an object, so a JSON
/// string is accepted as the value of `field` too.
pub fn string_arg<'a>(args: &'a Value, field: &str) -> Result<&'a str, ValidationError> {
    if let Some(s) = args.as_str() {
        return Ok(s);
    }
    match args.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
        None => Err(ValidationError::new(field, "is required")),
    }
}
