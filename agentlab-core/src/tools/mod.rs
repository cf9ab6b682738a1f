//! Tool system for the lab agent
//!
//! Tools are registered by name in a [`ToolRegistry`] and executed through the
//! [`ToolRuntime`], which validates arguments, applies a timeout and wraps
//! every outcome in a [`ToolResultEnvelope`]. Failures never escape as `Err`:
//! the agent hands them back to the model as tool output.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentlab_core::tools::{builtin, ToolExecutionContext, ToolRuntime};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let registry = builtin::builtin_registry(Arc::new(builtin::SystemClock));
//! let runtime = ToolRuntime::new();
//! let envelope = runtime
//!     .execute_by_name(&registry, "calculator", json!({"expression": "25 * 4 + 10"}), &ToolExecutionContext::new())
//!     .await;
//! assert_eq!(envelope.to_model_content(), "110");
//! # }
//! ```

pub mod builtin;
mod registry;
mod result;
mod runtime;
mod tool;

pub use registry::{RegistryError, ToolRegistry, ToolSummary};
pub use result::{
    ToolError, ToolErrorKind, ToolProvenance, ToolResult, ToolResultEnvelope, ValidationError,
};
pub use runtime::{ToolRuntime, ToolRuntimeConfig};
pub use tool::{
    BoxedTool, Tool, ToolDescriptor, ToolExecutionContext, ToolMetadata, ToolSchema, string_arg,
};
