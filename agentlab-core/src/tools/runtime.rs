//! Tool runtime
//!
//! The runtime wraps tool execution with:
//! - Argument validation
//! - Timeout
//! - Provenance (args hash, duration, run id)
//!
//! It never returns an error to the caller: every failure becomes an error
//! envelope that the agent hands back to the model.

use super::registry::ToolRegistry;
use super::result::{ToolError, ToolProvenance, ToolResultEnvelope};
use super::tool::{Tool, ToolExecutionContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRuntimeConfig {
    /// Default timeout for tool execution
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Per-tool timeout overrides
    #[serde(default)]
    pub tool_timeouts: HashMap<String, Duration>,
}

impl Default for ToolRuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            tool_timeouts: HashMap::new(),
        }
    }
}

impl ToolRuntimeConfig {
    /// Create a config with a specific timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_name.into(), timeout);
        self
    }
}

/// Tool runtime
#[derive(Debug, Clone, Default)]
pub struct ToolRuntime {
    config: ToolRuntimeConfig,
}

impl ToolRuntime {
    /// Create a runtime with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime with custom configuration
    pub fn with_config(config: ToolRuntimeConfig) -> Self {
        Self { config }
    }

    /// Get the runtime config
    pub fn config(&self) -> &ToolRuntimeConfig {
        &self.config
    }

    fn get_timeout(&self, tool_name: &str) -> Duration {
        self.config
            .tool_timeouts
            .get(tool_name)
            .copied()
            .unwrap_or(self.config.default_timeout)
    }

    /// Look up `name` in the registry and execute it.
    ///
    /// An unknown name yields a `NotFound` envelope.
    pub async fn execute_by_name(
        &self,
        registry: &ToolRegistry,
        name: &str,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> ToolResultEnvelope {
        match registry.get(name) {
            Some(tool) => self.execute(tool.as_ref(), args, ctx).await,
            None => self.unavailable(name, &args, ctx),
        }
    }

    /// Envelope for a call to a tool that is unknown or not offered to the model
    pub fn unavailable(
        &self,
        name: &str,
        args: &Value,
        ctx: &ToolExecutionContext,
    ) -> ToolResultEnvelope {
        warn!(tool = %name, "Model requested an unavailable tool");
        let provenance = provenance_for(name, args, ctx);
        ToolResultEnvelope::error(ToolError::not_found(name), provenance)
    }

    /// Execute a tool: validate, then run under the configured timeout
    pub async fn execute(
        &self,
        tool: &dyn Tool,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> ToolResultEnvelope {
        let started_at = chrono::Utc::now();
        let tool_name = tool.name().to_string();
        let mut provenance = provenance_for(&tool_name, &args, ctx);

        info!(tool = %tool_name, args = %args, "Tool called");

        if let Err(validation_errors) = tool.validate(&args) {
            let error = ToolError::validation(validation_errors);
            warn!(tool = %tool_name, error = %error.message, "Tool arguments rejected");
            provenance = provenance.with_duration(elapsed_since(started_at));
            return ToolResultEnvelope::error(error, provenance);
        }

        let tool_timeout = self.get_timeout(&tool_name);
        let result = match timeout(tool_timeout, tool.execute(args, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::timeout(tool_timeout)),
        };

        provenance = provenance.with_duration(elapsed_since(started_at));

        match result {
            Ok(value) => {
                debug!(tool = %tool_name, result = %value, "Tool result");
                ToolResultEnvelope::success(value, provenance)
            }
            Err(error) => {
                warn!(tool = %tool_name, kind = ?error.kind, error = %error.message, "Tool failed");
                ToolResultEnvelope::error(error, provenance)
            }
        }
    }
}

fn provenance_for(tool_name: &str, args: &Value, ctx: &ToolExecutionContext) -> ToolProvenance {
    let args_json = serde_json::to_string(args).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(args_json.as_bytes());
    let args_hash = format!("{:x}", hasher.finalize());

    let provenance = ToolProvenance::new(tool_name, &args_hash[..16]);
    match ctx.run_id {
        Some(ref run_id) => provenance.with_run_id(run_id),
        None => provenance,
    }
}

fn elapsed_since(started_at: chrono::DateTime<chrono::Utc>) -> Duration {
    (chrono::Utc::now() - started_at).to_std().unwrap_or_default()
}

#[cfg(test)]
mod runtime_tests {
    use super::*;
    use crate::tools::{ToolErrorKind, ToolMetadata, ToolSchema, ValidationError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct SlowTool {
        metadata: ToolMetadata,
        delay: Duration,
    }

    #[async_trait]
    impl Tool for SlowTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.metadata
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::empty()
        }

        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolExecutionContext,
        ) -> Result<Value, ToolError> {
            tokio::time::sleep(self.delay).await;
            Ok(json!("done"))
        }
    }

    struct StrictTool {
        metadata: ToolMetadata,
    }

    #[async_trait]
    impl Tool for StrictTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.metadata
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::single_string("value", "Anything")
        }

        fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
            if args.get("value").is_none() {
                return Err(vec![ValidationError::new("value", "is required")]);
            }
            Ok(())
        }

        async fn execute(
            &self,
            args: Value,
            _ctx: &ToolExecutionContext,
        ) -> Result<Value, ToolError> {
            Ok(args["value"].clone())
        }
    }

    fn slow(delay: Duration) -> SlowTool {
        SlowTool {
            metadata: ToolMetadata::new("slow", "Sleeps"),
            delay,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_envelope() {
        let runtime =
            ToolRuntime::with_config(ToolRuntimeConfig::default().with_timeout(Duration::from_secs(1)));
        let envelope = runtime
            .execute(&slow(Duration::from_secs(10)), json!({}), &ToolExecutionContext::new())
            .await;

        assert_eq!(envelope.get_error().unwrap().kind, ToolErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_tool_timeout_override() {
        let config = ToolRuntimeConfig::default()
            .with_timeout(Duration::from_secs(1))
            .with_tool_timeout("slow", Duration::from_secs(30));
        let runtime = ToolRuntime::with_config(config);

        let envelope = runtime
            .execute(&slow(Duration::from_secs(10)), json!({}), &ToolExecutionContext::new())
            .await;
        assert!(envelope.is_success());
    }

    #[tokio::test]
    async fn test_validation_runs_before_execute() {
        let runtime = ToolRuntime::new();
        let tool = StrictTool {
            metadata: ToolMetadata::new("strict", "Needs a value"),
        };

        let envelope = runtime
            .execute(&tool, json!({}), &ToolExecutionContext::new())
            .await;
        assert_eq!(envelope.get_error().unwrap().kind, ToolErrorKind::Validation);

        let envelope = runtime
            .execute(&tool, json!({"value": "ok"}), &ToolExecutionContext::new())
            .await;
        assert_eq!(envelope.value(), Some(&json!("ok")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let runtime = ToolRuntime::new();
        let registry = ToolRegistry::new();
        let ctx = ToolExecutionContext::new().with_run_id("run-7");

        let envelope = runtime
            .execute_by_name(&registry, "teleport", json!({}), &ctx)
            .await;

        assert_eq!(envelope.get_error().unwrap().kind, ToolErrorKind::NotFound);
        assert_eq!(envelope.provenance.run_id.as_deref(), Some("run-7"));
    }

    #[tokio::test]
    async fn test_execute_by_name_finds_tool() {
        let runtime = ToolRuntime::new();
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StrictTool {
                metadata: ToolMetadata::new("strict", "Needs a value"),
            }))
            .unwrap();

        let envelope = runtime
            .execute_by_name(&registry, "strict", json!({"value": 3}), &ToolExecutionContext::new())
            .await;
        assert_eq!(envelope.value(), Some(&json!(3)));
        assert_eq!(envelope.provenance.args_hash.len(), 16);
    }
}
