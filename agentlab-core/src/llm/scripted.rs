//! Provider that replays canned responses
//!
//! Used by tests and dry integration runs to drive the agent loop without a
//! network. Every request is recorded for later inspection.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{LLMProvider, LLMRequest, LLMResponse, ModelInfo};
use crate::error::ProviderError;

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<LLMResponse, ProviderError>>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<LLMResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::new("scripted provider has no responses left")))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "none".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_errors() {
        let provider = ScriptedProvider::new(vec![
            Ok(LLMResponse::text("one")),
            Err(ProviderError::with_status(500, "boom")),
        ]);
        let request = LLMRequest::default();

        assert_eq!(provider.generate_request(&request).await.unwrap().content, "one");
        assert_eq!(provider.generate_request(&request).await.unwrap_err().status, Some(500));
        assert!(provider.generate_request(&request).await.is_err());
        assert_eq!(provider.call_count(), 3);
    }
}
