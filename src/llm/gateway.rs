// src/llm/gateway.rs
// One completion per call: option resolution, key rotation on rate limits,
// and normalization of the returned message

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::ParleyConfig;
use crate::llm::credentials::RotatingCredentialSet;
use crate::llm::provider::{
    CompletionOptions, CompletionRequest, CompletionResponse, CompletionTransport, Provider, TransportError,
};
use crate::llm::types::{LlmMessage, MessageKind, Role};

/// Closing marker of a reasoning preamble some models emit inline
pub const REASONING_END_MARKER: &str = "</think>";

const FALLBACK_TEMPERATURE: f32 = 0.0;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed configuration; nothing was sent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure. After a full rotation this is the last rate-limit error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Issues completion requests for one conversation.
///
/// Owns its credential cursor, so `complete` takes `&mut self`: callers
/// sharing a gateway serialize naturally, or each gets its own instance.
pub struct CompletionGateway {
    transport: Arc<dyn CompletionTransport>,
    provider: Provider,
    model: String,
    credentials: RotatingCredentialSet,
    base_url: Option<String>,
    default_options: CompletionOptions,
}

impl CompletionGateway {
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        provider: Provider,
        model: impl Into<String>,
        credentials: RotatingCredentialSet,
    ) -> Self {
        Self {
            transport,
            provider,
            model: model.into(),
            credentials,
            base_url: None,
            default_options: CompletionOptions::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_default_options(mut self, options: CompletionOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Build a gateway from loaded configuration
    pub fn from_config(config: &ParleyConfig, transport: Arc<dyn CompletionTransport>) -> Result<Self, GatewayError> {
        let provider: Provider = config.provider.parse().map_err(GatewayError::Config)?;
        let credentials = RotatingCredentialSet::new(config.api_keys().to_vec())
            .ok_or_else(|| GatewayError::Config("PARLEY_API_KEYS must contain at least one key".to_string()))?;

        let mut gateway = Self::new(transport, provider, config.model.clone(), credentials).with_default_options(
            CompletionOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                ..Default::default()
            },
        );
        gateway.base_url = config.base_url.clone();
        Ok(gateway)
    }

    pub fn credentials(&self) -> &RotatingCredentialSet {
        &self.credentials
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Providers without a public endpoint fall back to OpenAI when no base URL is set
    pub fn effective_provider(&self) -> Provider {
        if self.provider.requires_base_url() && self.base_url.is_none() {
            warn!(
                "{} provider selected without a base_url; falling back to {}",
                self.provider,
                Provider::OpenAi
            );
            return Provider::OpenAi;
        }
        self.provider
    }

    /// Per-call options win as a whole over gateway defaults
    pub fn resolve_options(&self, per_call: Option<&CompletionOptions>) -> CompletionOptions {
        match per_call {
            Some(options) if !options.is_empty() => options.clone(),
            _ => self.default_options.clone(),
        }
    }

    pub async fn complete(
        &mut self,
        messages: &[LlmMessage],
        tools: &[Value],
        options: Option<CompletionOptions>,
    ) -> Result<LlmMessage, GatewayError> {
        let resolved = self.resolve_options(options.as_ref());
        let provider = self.effective_provider();

        debug!(
            "Using base_url={:?} options={:?} Sending {}",
            self.base_url,
            resolved,
            serde_json::to_string_pretty(messages).unwrap_or_default()
        );

        let response_format = resolved
            .response_format
            .clone()
            .or_else(|| find_last_user_response_format(messages));

        let mut request = CompletionRequest {
            provider,
            model: self.model.clone(),
            api_key: String::new(),
            base_url: self.base_url.clone(),
            temperature: resolved.temperature.unwrap_or(FALLBACK_TEMPERATURE),
            max_tokens: resolved.max_tokens,
            extra: resolved.extra,
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            response_format,
        };

        let response = self.send_with_rotation(&mut request).await?;

        let message = normalize_response(response);
        debug!("{}", message);
        Ok(message)
    }

    async fn send_with_rotation(&mut self, request: &mut CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let max_iter = self.credentials.max_iter();
        let mut last_rate_limit = None;

        for attempt in 1..=max_iter {
            request.api_key = self.credentials.current().to_string();

            match self.transport.complete(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_rate_limited() => {
                    warn!(
                        "{} rate limited on key {}/{} (attempt {}), rotating",
                        request.provider,
                        self.credentials.position() + 1,
                        max_iter,
                        attempt
                    );
                    last_rate_limit = Some(err);
                    self.credentials.next();
                }
                Err(err) => {
                    error!(
                        "Completion failed: provider={} model={} transport={} attempt={}/{} error={}",
                        request.provider,
                        request.model,
                        self.transport.name(),
                        attempt,
                        max_iter,
                        err
                    );
                    return Err(err.into());
                }
            }
        }

        let err = match last_rate_limit {
            Some(err) => GatewayError::Transport(err),
            None => GatewayError::Config("credential set is empty".to_string()),
        };
        error!(
            "Completion failed after {} attempt(s): provider={} model={} error={}",
            max_iter, request.provider, request.model, err
        );
        Err(err)
    }
}

/// Schema declared by the most recent user turn, if that turn declares one
pub fn find_last_user_response_format(messages: &[LlmMessage]) -> Option<Value> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.response_format.clone())
}

/// Keep only what follows the reasoning marker, when there is one
pub fn strip_reasoning_preamble(content: &str) -> &str {
    match content.split_once(REASONING_END_MARKER) {
        Some((_, after)) => after,
        None => content,
    }
}

fn normalize_response(response: CompletionResponse) -> LlmMessage {
    let kind = if response.tool_calls.is_empty() {
        MessageKind::Message
    } else {
        MessageKind::ToolCall
    };

    LlmMessage {
        role: Role::Assistant,
        content: response.content.as_deref().map(|c| strip_reasoning_preamble(c).to_string()),
        data: None,
        tool_calls: if response.tool_calls.is_empty() {
            None
        } else {
            Some(response.tool_calls)
        },
        kind,
        response_format: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_reasoning_preamble() {
        assert_eq!(strip_reasoning_preamble("<think>hmm</think>Answer"), "Answer");
        assert_eq!(strip_reasoning_preamble("no marker"), "no marker");
        assert_eq!(strip_reasoning_preamble("a</think>b</think>c"), "b</think>c");
    }

    #[test]
    fn test_last_user_format_only_checks_latest_user_turn() {
        let messages = vec![
            LlmMessage::user("first").with_response_format(json!({"type": "json_object"})),
            LlmMessage::assistant("ok"),
            LlmMessage::user("second"),
        ];
        assert_eq!(find_last_user_response_format(&messages), None);

        let messages = vec![
            LlmMessage::system("sys"),
            LlmMessage::user("q").with_response_format(json!({"type": "json_object"})),
            LlmMessage::assistant("a"),
        ];
        assert_eq!(
            find_last_user_response_format(&messages),
            Some(json!({"type": "json_object"}))
        );
    }

    #[test]
    fn test_normalize_native_tool_call() {
        let response = CompletionResponse {
            content: None,
            tool_calls: vec![crate::llm::types::ToolCall::function("lookup", Default::default())],
            finish_reason: None,
        };
        let message = normalize_response(response);
        assert_eq!(message.kind, MessageKind::ToolCall);
        assert_eq!(message.first_tool_call().map(|c| c.name.as_str()), Some("lookup"));
        assert!(message.content.is_none());
    }
}
