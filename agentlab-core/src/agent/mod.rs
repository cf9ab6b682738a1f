//! Agent runners
//!
//! An [`AgentRunner`] turns one natural-language query into one answer. The
//! safe-invocation wrapper only sees this trait, so tests swap in a
//! [`ScriptedRunner`] while the CLI uses a [`ToolCallingAgent`].

mod runner;

pub use runner::{
    AgentRequest, AgentResponse, AgentRunner, AgentStep, ScriptedRunner, ToolCallingAgent,
};
