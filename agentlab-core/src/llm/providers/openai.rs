//! OpenAI-compatible chat-completions provider
//!
//! Works against any endpoint speaking the OpenAI function-calling wire
//! format; the default configuration points at GitHub Models.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{AgentLabError, ProviderError, Result};
use crate::llm::probe::ProbeReport;
use crate::llm::{
    LLMProvider, LLMRequest, LLMResponse, Message, MessageRole, ModelInfo, TokenUsage, ToolCall,
};
use crate::tools::ToolDescriptor;

pub struct OpenAICompatibleProvider {
    client: reqwest::Client,
    token: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl OpenAICompatibleProvider {
    /// Create a provider with a default HTTP client.
    ///
    /// # Arguments
    ///
    /// * `token` - Bearer token
    /// * `model` - Model name (e.g., "openai/gpt-4o")
    /// * `base_url` - API base URL, without `/chat/completions`
    pub fn new(
        token: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), token, model, base_url)
    }

    fn with_client(
        client: reqwest::Client,
        token: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token: token.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Create from the `[llm]` configuration section and a resolved token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AgentLabError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let mut provider = Self::with_client(client, token, &config.model, &config.base_url)
            .with_temperature(config.effective_temperature());
        provider.max_tokens = config.max_tokens;
        Ok(provider)
    }

    /// Default temperature, used when a request does not set one
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Default completion limit, used when a request does not set one
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &LLMRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: convert_messages(&request.messages),
            tools: convert_tools(&request.tools),
            temperature: request.temperature.or(self.temperature),
            max_tokens: request.max_tokens.or(self.max_tokens),
        }
    }

    async fn send(&self, body: &ChatRequest) -> std::result::Result<reqwest::Response, ProviderError> {
        self.client
            .post(self.endpoint())
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to send request: {}", e)))
    }

    /// Send a minimal "ping" completion and report the rate-limit headers.
    ///
    /// Never fails: transport errors become a report without a status.
    pub async fn probe(&self) -> ProbeReport {
        let request = LLMRequest::new(vec![Message::user("ping")])
            .with_max_tokens(5)
            .with_temperature(0.0);
        let body = self.build_request(&request);

        info!(model = %self.model, "Probing provider");
        let response = match self.send(&body).await {
            Ok(response) => response,
            Err(err) => return ProbeReport::failed(None, err.message),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let report = if status.is_success() {
            ProbeReport::succeeded(status.as_u16())
        } else {
            let text = response.text().await.unwrap_or_default();
            let err = parse_error(status.as_u16(), &text, None);
            ProbeReport::failed(Some(status.as_u16()), err.message)
        };
        report.with_headers(&headers)
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate_request(
        &self,
        request: &LLMRequest,
    ) -> std::result::Result<LLMResponse, ProviderError> {
        let body = self.build_request(request);
        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "Sending chat completion"
        );

        let response = self.send(&body).await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = parse_error(status.as_u16(), &text, retry_after.as_deref());
            if err.is_rate_limited() {
                warn!(status = status.as_u16(), retry_after = ?err.retry_after, "Provider rate limit hit");
            } else {
                warn!(status = status.as_u16(), error = %err.message, "Provider returned an error");
            }
            return Err(err);
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to read response: {}", e)))?;
        parse_response(&text)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai-compatible".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<Value>,
}

fn function_kind() -> String {
    "function".to_string()
}

fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| {
            let tool_calls = (!m.tool_calls.is_empty()).then(|| {
                m.tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: function_kind(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect()
            });
            // An assistant turn that only requested tools carries null content.
            let content = if m.role == MessageRole::Assistant && m.content.is_empty() && tool_calls.is_some() {
                None
            } else {
                Some(m.content.clone())
            };
            WireMessage {
                role: m.role.as_str(),
                content,
                tool_calls,
                tool_call_id: m.tool_call_id.clone(),
            }
        })
        .collect()
}

fn convert_tools(tools: &[ToolDescriptor]) -> Option<Vec<WireTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect(),
    )
}

/// Arguments arrive as a JSON string; anything unparsable is passed through
/// as a bare string so the tool can still validate it.
fn decode_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_response(body: &str) -> std::result::Result<LLMResponse, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::new(format!("Failed to parse response: {}", e)))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .ok_or_else(|| ProviderError::new("Provider returned no choices"))?;

    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            ToolCall::new(
                call.id,
                call.function.name,
                decode_arguments(&call.function.arguments),
            )
        })
        .collect();

    Ok(LLMResponse {
        content: message.content.unwrap_or_default(),
        tool_calls,
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

fn parse_error(status: u16, body: &str, retry_after: Option<&str>) -> ProviderError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => match parsed.error.code {
            Some(Value::String(code)) => format!("{}: {}", code, parsed.error.message),
            _ => parsed.error.message,
        },
        Err(_) if body.trim().is_empty() => "Unknown error".to_string(),
        Err(_) => body.trim().to_string(),
    };

    let err = ProviderError::with_status(status, message);
    match retry_after.and_then(parse_retry_after) {
        Some(delay) => err.with_retry_after(delay),
        None => err,
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Seconds form of `retry-after`; HTTP-date values are ignored.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs(secs as u64))
    } else {
        None
    }
}
