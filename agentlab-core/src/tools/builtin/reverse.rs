//! String reversal tool
//!
//! Reverses Unicode scalar values, not grapheme clusters: combining marks and
//! multi-codepoint emoji come out scrambled.

use crate::tools::{
    Tool, ToolError, ToolExecutionContext, ToolMetadata, ToolSchema, ValidationError, string_arg,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

pub fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}

pub struct ReverseStringTool {
    metadata: ToolMetadata,
}

impl ReverseStringTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata::new(
                "reverse_string",
                "Reverses a string. Input should be a single string.",
            )
            .with_returns("The reversed string")
            .with_tag("text"),
        }
    }
}

impl Default for ReverseStringTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReverseStringTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single_string("text", "The string to reverse")
    }

    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        string_arg(args, "text").map(|_| ()).map_err(|e| vec![e])
    }

    async fn execute(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<Value, ToolError> {
        let text = string_arg(&args, "text").map_err(|e| ToolError::validation(vec![e]))?;
        let reversed = reverse(text);
        info!(input = %text, result = %reversed, "reverse_string");
        Ok(Value::String(reversed))
    }
}
