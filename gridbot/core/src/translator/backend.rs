//! LLM Backend Traits
//!
//! Common interface for the chat-completion services the translator can use.
//! Implementations handle provider-specific details (API format, auth).

use async_trait::async_trait;

/// A single chat-completion request
#[derive(Clone, Debug, PartialEq)]
pub struct LlmRequest {
    /// User message
    pub prompt: String,
    /// Model identifier (backend-specific)
    pub model: String,
    /// System prompt, sent before the user message
    pub system: Option<String>,
    /// Sampling temperature (0.0-1.0)
    pub temperature: f32,
    /// Maximum tokens in the response (0 = backend default)
    pub max_tokens: u32,
    /// Ask the backend for a JSON object response
    pub json_response: bool,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: String::new(),
            system: None,
            temperature: 0.1,
            max_tokens: 0,
            json_response: false,
        }
    }
}

impl LlmRequest {
    /// Create a request with prompt and model
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request a JSON object response
    #[must_use]
    pub fn with_json_response(mut self, json_response: bool) -> Self {
        self.json_response = json_response;
        self
    }
}

/// Completed response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmResponse {
    /// Response text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Tokens used, if reported
    pub tokens_used: Option<u32>,
}

/// LLM backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Backend name, e.g. "OpenAI"
    fn name(&self) -> &str;

    /// Whether the backend is reachable
    async fn health_check(&self) -> bool;

    /// Send a request and wait for the full response
    async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_request_builder() {
        let request = LlmRequest::new("go north", "gpt-4o-mini")
            .with_system("You drive a robot")
            .with_temperature(3.0)
            .with_max_tokens(150)
            .with_json_response(true);

        assert_eq!(request.prompt, "go north");
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.system.as_deref(), Some("You drive a robot"));
        assert!((request.temperature - 1.0).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 150);
        assert!(request.json_response);
    }
}
