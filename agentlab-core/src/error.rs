//! Error types for agentlab operations

use std::time::Duration;

use crate::tools::{RegistryError, ToolError};

/// Result type for agentlab operations
pub type Result<T> = std::result::Result<T, AgentLabError>;

/// Error types for the agentlab runtime
#[derive(Debug, thiserror::Error)]
pub enum AgentLabError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider access token is not present in the environment
    #[error("{var} not found. Create a .env file in your project root with: {var}=your_token_here")]
    MissingToken { var: String },

    /// Provider call failed
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Provider refused the call with a rate-limit signal
    #[error("Rate limited by provider: {0}")]
    RateLimited(ProviderError),

    /// Tool execution failed
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Tool registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl AgentLabError {
    /// Whether the process should stop processing further queries
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentLabError::RateLimited(_)
                | AgentLabError::MissingToken { .. }
                | AgentLabError::Configuration(_)
        )
    }
}

impl From<ProviderError> for AgentLabError {
    fn from(err: ProviderError) -> Self {
        if err.is_rate_limited() {
            AgentLabError::RateLimited(err)
        } else {
            AgentLabError::Provider(err)
        }
    }
}

impl From<String> for AgentLabError {
    fn from(s: String) -> Self {
        AgentLabError::Other(s)
    }
}

impl From<&str> for AgentLabError {
    fn from(s: &str) -> Self {
        AgentLabError::Other(s.to_string())
    }
}

/// Failure reported by an LLM provider or by the agent loop driving it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.describe())]
pub struct ProviderError {
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,

    /// Human-readable message
    pub message: String,

    /// Value of the `retry-after` header, if the provider sent one
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    /// Create an error without an HTTP status (transport, parsing, agent loop)
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an error from an HTTP status and message
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a retry-after hint
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Whether this failure is the provider's "too many requests" signal.
    ///
    /// An HTTP status is authoritative: only 429 counts. Failures without a
    /// status are matched on the provider's wording.
    pub fn is_rate_limited(&self) -> bool {
        if let Some(status) = self.status {
            return status == 429;
        }
        let msg = self.message.to_lowercase();
        msg.contains("too many requests") || msg.contains("rate limit")
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("({}) {}", status, self.message),
            None => self.message.clone(),
        }
    }
}
