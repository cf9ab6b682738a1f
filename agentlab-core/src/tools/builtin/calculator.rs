//! Calculator tool backed by the restricted arithmetic evaluator

use crate::arithmetic::{self, ArithmeticError};
use crate::tools::{
    Tool, ToolError, ToolExecutionContext, ToolMetadata, ToolSchema, ValidationError, string_arg,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

pub struct CalculatorTool {
    metadata: ToolMetadata,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata::new(
                "calculator",
                "Evaluates a basic arithmetic expression (e.g., '25 * 4 + 10') and returns the numeric result. \
                 Supports digits, + - * / and parentheses.",
            )
            .with_returns("The result as a string")
            .with_tag("math"),
        }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ArithmeticError> for ToolError {
    fn from(err: ArithmeticError) -> Self {
        let code = match err {
            ArithmeticError::InvalidCharacter { .. } => "INVALID_CHARACTER",
            ArithmeticError::DivisionByZero { .. } => "DIVISION_BY_ZERO",
            ArithmeticError::UnbalancedParenthesis { .. } => "UNBALANCED_PARENTHESIS",
            _ => "MALFORMED_EXPRESSION",
        };
        ToolError::invalid_input(err.to_string()).with_code(code)
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single_string("expression", "A math expression like '25 * 4 + 10'")
    }

    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        let expression = string_arg(args, "expression").map_err(|e| vec![e])?;
        arithmetic::check_characters(expression)
            .map_err(|e| vec![ValidationError::new("expression", e.to_string())])
    }

    async fn execute(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<Value, ToolError> {
        let expression =
            string_arg(&args, "expression").map_err(|e| ToolError::validation(vec![e]))?;
        info!(expression = %expression, "Calculator tool called");

        match arithmetic::evaluate_to_string(expression) {
            Ok(result) => {
                info!(result = %result, "Calculator result");
                Ok(Value::String(result))
            }
            Err(err) => {
                warn!(error = %err, "Calculator rejected expression");
                Err(err.into())
            }
        }
    }
}
