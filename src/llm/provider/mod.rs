// src/llm/provider/mod.rs
// Completion transport trait and type definitions for multi-provider support

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::types::{LlmMessage, ToolCall};

pub mod openai;

pub use openai::OpenAiCompatibleTransport;

/// Provider families reachable through the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Azure,
    DeepSeek,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Azure => "azure",
            Provider::DeepSeek => "deepseek",
        }
    }

    /// Providers that have no public endpoint and need a configured base URL
    pub fn requires_base_url(&self) -> bool {
        matches!(self, Provider::Azure)
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::DeepSeek => Some("https://api.deepseek.com/v1"),
            Provider::Azure => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "azure" => Ok(Provider::Azure),
            "deepseek" => Ok(Provider::DeepSeek),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Sampling options for one request. Unset fields fall back to gateway defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Expected-output schema (`response_format` on the wire)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    /// Provider-specific parameters passed through as-is
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl CompletionOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_response_format(mut self, schema: Value) -> Self {
        self.response_format = Some(schema);
        self
    }
}

/// Everything the transport needs for one call, with options already resolved
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub extra: Map<String, Value>,
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<Value>,
    pub response_format: Option<Value>,
}

/// Provider reply reduced to what the engine consumes
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The provider refused the key for now; the gateway rotates on this
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl TransportError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimited { .. })
    }
}

/// Synchronous-per-turn completion call against some provider
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Transport name for logging/debugging
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("Azure".parse::<Provider>(), Ok(Provider::Azure));
        assert!("bedrock".parse::<Provider>().is_err());
    }

    #[test]
    fn test_only_azure_needs_base_url() {
        assert!(Provider::Azure.requires_base_url());
        assert!(Provider::Azure.default_base_url().is_none());
        assert!(!Provider::OpenAi.requires_base_url());
    }

    #[test]
    fn test_default_options_are_empty() {
        assert!(CompletionOptions::default().is_empty());
        assert!(!CompletionOptions::default().with_temperature(0.2).is_empty());
    }
}
