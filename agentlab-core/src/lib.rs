//! # agentlab
//!
//! A small tool-calling agent for experimenting with hosted chat models
//! without burning through a rate limit.
//!
//! - Mock tools: a restricted arithmetic evaluator, date and time, a weather
//!   stub and a string reverser
//! - An OpenAI-compatible provider with rate-limit detection and a probe
//! - A tool-calling agent loop behind the [`agent::AgentRunner`] trait
//! - A safe-invocation wrapper (dry run, operator confirmation, cooldown)
//!   and a sequential batch runner that stops on the first rate limit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentlab_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AgentLabConfig::load()?;
//!     let token = config.resolve_token()?;
//!
//!     let provider = Arc::new(OpenAICompatibleProvider::from_config(&config.llm, token)?);
//!     let registry = Arc::new(builtin_registry(Arc::new(SystemClock)));
//!     let tools = registry.descriptors();
//!     let agent = ToolCallingAgent::new(provider, registry);
//!
//!     let invoker = SafeInvoker::new(
//!         Arc::new(agent),
//!         Arc::new(StdinConfirmer::stdin()),
//!         InvocationPolicy::from(&config.invocation),
//!     )
//!     .with_system_prompt(&config.agent.system_prompt)
//!     .with_tools(tools);
//!
//!     let summary = run_batch(&invoker, &config.queries, |_, report| {
//!         println!("{:?}", report.outcome);
//!     })
//!     .await;
//!     println!("{} completed", summary.completed);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod arithmetic;
pub mod batch;
pub mod config;
pub mod error;
pub mod invocation;
pub mod llm;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{AgentRequest, AgentResponse, AgentRunner, ToolCallingAgent};
    pub use crate::batch::{BatchSummary, run_batch};
    pub use crate::config::AgentLabConfig;
    pub use crate::error::{AgentLabError, ProviderError, Result};
    pub use crate::invocation::{
        AutoConfirm, Confirmer, FailureKind, InvocationOutcome, InvocationPolicy,
        InvocationReport, InvocationResult, SafeInvoker, StdinConfirmer,
    };
    pub use crate::llm::{LLMProvider, OpenAICompatibleProvider};
    pub use crate::tools::builtin::{SystemClock, builtin_registry};
    pub use crate::tools::{Tool, ToolRegistry, ToolRuntime};
}
