use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::llm::{LLMProvider, LLMRequest, Message};
use crate::tools::{ToolDescriptor, ToolExecutionContext, ToolRegistry, ToolRuntime};

/// One query for a runner
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub query: String,
    pub system_prompt: String,

    /// Tools the model may call for this query
    pub tools: Vec<ToolDescriptor>,
}

impl AgentRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            system_prompt: String::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

/// A tool call made while answering a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub tool: String,
    pub arguments: Value,

    /// What the model was told the call returned
    pub output: String,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub output: String,
    pub steps: Vec<AgentStep>,
}

impl AgentResponse {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            steps: Vec::new(),
        }
    }
}

/// Answers one query. Provider failures are returned unchanged so callers can
/// still recognize a rate limit.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse, ProviderError>;
}

/// Tool-calling loop over an [`LLMProvider`].
///
/// Each model turn either answers in text, which ends the run, or asks for
/// tool calls. Calls are executed in order and their results appended as tool
/// messages before the next turn. Tool failures are reported to the model,
/// never to the caller.
pub struct ToolCallingAgent<P: LLMProvider + ?Sized> {
    provider: Arc<P>,
    registry: Arc<ToolRegistry>,
    runtime: ToolRuntime,
    max_steps: usize,
    run_id: Option<String>,
}

impl<P: LLMProvider + ?Sized> ToolCallingAgent<P> {
    pub fn new(provider: Arc<P>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            runtime: ToolRuntime::new(),
            max_steps: 8,
            run_id: None,
        }
    }

    pub fn with_runtime(mut self, runtime: ToolRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Upper bound on model turns; values below 1 are raised to 1
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Run id stamped on tool provenance
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn initial_messages(request: &AgentRequest) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.trim().is_empty() {
            messages.push(Message::system(&request.system_prompt));
        }
        messages.push(Message::user(&request.query));
        messages
    }
}

#[async_trait]
impl<P: LLMProvider + ?Sized> AgentRunner for ToolCallingAgent<P> {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse, ProviderError> {
        let mut messages = Self::initial_messages(request);
        let mut steps = Vec::new();

        for turn in 1..=self.max_steps {
            debug!(turn, max_steps = self.max_steps, "Agent turn");
            let llm_request =
                LLMRequest::new(messages.clone()).with_tools(request.tools.clone());
            let response = self.provider.generate_request(&llm_request).await?;

            if !response.has_tool_calls() {
                info!(turn, tool_calls = steps.len(), "Agent answered");
                return Ok(AgentResponse {
                    output: response.content,
                    steps,
                });
            }

            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in response.tool_calls {
                let mut ctx = ToolExecutionContext::new().with_call_id(&call.id);
                if let Some(run_id) = &self.run_id {
                    ctx = ctx.with_run_id(run_id);
                }

                let offered = request.tools.iter().any(|t| t.name == call.name);
                let envelope = if offered {
                    self.runtime
                        .execute_by_name(&self.registry, &call.name, call.arguments.clone(), &ctx)
                        .await
                } else {
                    self.runtime.unavailable(&call.name, &call.arguments, &ctx)
                };

                let output = envelope.to_model_content();
                messages.push(Message::tool(&call.id, &output));
                steps.push(AgentStep {
                    tool: call.name,
                    arguments: call.arguments,
                    output,
                    success: envelope.is_success(),
                });
            }
        }

        Err(ProviderError::new(format!(
            "Agent stopped after {} model turns without a final answer",
            self.max_steps
        )))
    }
}

/// Runner that replays canned results and records the queries it was given
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: Mutex<VecDeque<Result<AgentResponse, ProviderError>>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<Result<AgentResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queries received so far, in call order
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse, ProviderError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.query.clone());

        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::new("scripted runner has no results left")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMResponse, MessageRole, ScriptedProvider, ToolCall};
    use crate::tools::builtin::{FixedClock, SUNNY, builtin_registry};
    use serde_json::json;

    fn agent(provider: Arc<ScriptedProvider>) -> ToolCallingAgent<ScriptedProvider> {
        let registry = builtin_registry(Arc::new(FixedClock::on(2023, 4, 5).unwrap()));
        ToolCallingAgent::new(provider, Arc::new(registry))
    }

    fn request(agent: &ToolCallingAgent<ScriptedProvider>, query: &str) -> AgentRequest {
        AgentRequest::new(query)
            .with_system_prompt("be brief")
            .with_tools(agent.registry().descriptors())
    }

    #[tokio::test]
    async fn test_plain_answer_without_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(LLMResponse::text("Hi!"))]));
        let agent = agent(provider.clone());

        let response = agent.run(&request(&agent, "Hello")).await.unwrap();
        assert_eq!(response.output, "Hi!");
        assert!(response.steps.is_empty());

        let sent = provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].messages[0].role, MessageRole::System);
        assert_eq!(sent[0].messages[1].content, "Hello");
        assert_eq!(sent[0].tools.len(), 5);
    }

    #[tokio::test]
    async fn test_weather_today_chains_two_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::calls(vec![ToolCall::new("c1", "get_current_date", json!({}))])),
            Ok(LLMResponse::calls(vec![ToolCall::new(
                "c2",
                "get_weather",
                json!({"date": "2023-04-05"}),
            )])),
            Ok(LLMResponse::text("It's sunny today.")),
        ]));
        let agent = agent(provider.clone());

        let response = agent
            .run(&request(&agent, "What's the weather like today?"))
            .await
            .unwrap();

        assert_eq!(response.output, "It's sunny today.");
        assert_eq!(response.steps.len(), 2);
        assert_eq!(response.steps[0].output, "2023-04-05");
        assert_eq!(response.steps[1].output, SUNNY);

        // the last request carries both tool results, linked by call id
        let last = provider.requests().pop().unwrap();
        let tool_messages: Vec<_> = last
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(tool_messages[1].content, SUNNY);
    }

    #[tokio::test]
    async fn test_tool_validation_error_is_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::calls(vec![ToolCall::new(
                "c1",
                "calculator",
                json!({"expression": "2 ** 8; import os"}),
            )])),
            Ok(LLMResponse::text("I can't evaluate that.")),
        ]));
        let agent = agent(provider.clone());

        let response = agent.run(&request(&agent, "compute")).await.unwrap();
        assert_eq!(response.output, "I can't evaluate that.");
        assert!(!response.steps[0].success);
        assert!(response.steps[0].output.starts_with("Error: "));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_tool_not_offered_is_not_executed() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::calls(vec![ToolCall::new(
                "c1",
                "reverse_string",
                json!({"text": "abc"}),
            )])),
            Ok(LLMResponse::text("done")),
        ]));
        let agent = agent(provider.clone());

        let req = AgentRequest::new("reverse abc");
        let response = agent.run(&req).await.unwrap();
        assert!(!response.steps[0].success);
        assert_eq!(response.steps[0].output, "Error: Unknown tool 'reverse_string'");
    }

    #[tokio::test]
    async fn test_provider_error_propagates_unchanged() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::with_status(
            429,
            "Too Many Requests",
        ))]));
        let agent = agent(provider);

        let err = agent.run(&request(&agent, "q")).await.unwrap_err();
        assert_eq!(err.status, Some(429));
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_step_limit() {
        let looping = || Ok(LLMResponse::calls(vec![ToolCall::new("c", "get_current_date", json!({}))]));
        let provider = Arc::new(ScriptedProvider::new(vec![looping(), looping(), looping()]));
        let agent = agent(provider.clone()).with_max_steps(2);

        let err = agent.run(&request(&agent, "loop")).await.unwrap_err();
        assert!(err.message.contains("2 model turns"));
        assert!(!err.is_rate_limited());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_runner_records_queries() {
        let runner = ScriptedRunner::new(vec![Ok(AgentResponse::text("a"))]);
        assert_eq!(runner.run(&AgentRequest::new("q1")).await.unwrap().output, "a");
        assert!(runner.run(&AgentRequest::new("q2")).await.is_err());
        assert_eq!(runner.queries(), vec!["q1", "q2"]);
    }
}
