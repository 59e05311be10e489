// src/llm/provider/openai.rs
// OpenAI-compatible chat completions transport (OpenAI, Azure OpenAI, DeepSeek)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, CompletionTransport, Provider, TransportError};
use crate::llm::types::{LlmMessage, ToolCall};

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

pub struct OpenAiCompatibleTransport {
    client: Client,
    azure_api_version: String,
}

impl OpenAiCompatibleTransport {
    pub fn new(timeout: Duration, azure_api_version: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            azure_api_version: azure_api_version.into(),
        })
    }

    fn endpoint(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let base = request
            .base_url
            .as_deref()
            .or(request.provider.default_base_url())
            .ok_or_else(|| {
                TransportError::Network(format!("no endpoint configured for provider {}", request.provider))
            })?
            .trim_end_matches('/');

        Ok(match request.provider {
            Provider::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, request.model, self.azure_api_version
            ),
            Provider::OpenAi | Provider::DeepSeek => format!("{}/chat/completions", base),
        })
    }
}

/// Build the JSON body for `/chat/completions`
pub fn build_request_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(to_wire_message).collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
    });

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools.clone());
    }
    if let Some(format) = &request.response_format {
        body["response_format"] = format.clone();
    }
    for (key, value) in &request.extra {
        body[key] = value.clone();
    }

    body
}

fn to_wire_message(message: &LlmMessage) -> Value {
    json!({
        "role": message.role.as_str(),
        "content": message.content.clone().unwrap_or_default(),
    })
}

/// Extract content and native tool calls from an OpenAI-format response
pub fn parse_response_body(raw: &Value) -> Result<CompletionResponse, TransportError> {
    let choice = raw["choices"]
        .get(0)
        .ok_or_else(|| TransportError::Parse("No choices in completion response".to_string()))?;
    let message = &choice["message"];

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| TransportError::Parse("Tool call without function name".to_string()))?;
            let arguments = call["function"]["arguments"].as_str().unwrap_or("");
            tool_calls.push(ToolCall::from_json_arguments(name, arguments).map_err(TransportError::Parse)?);
        }
    }

    Ok(CompletionResponse {
        content: message["content"].as_str().map(String::from),
        tool_calls,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
    })
}

fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|secs| secs.checked_mul(1000))
}

#[async_trait]
impl CompletionTransport for OpenAiCompatibleTransport {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, TransportError> {
        let start = Instant::now();
        let url = self.endpoint(request)?;
        let body = build_request_body(request);

        debug!("{} request: model={}, tools={}", request.provider, request.model, request.tools.len());

        let builder = self.client.post(&url).json(&body);
        let builder = match request.provider {
            Provider::Azure => builder.header("api-key", &request.api_key),
            Provider::OpenAi | Provider::DeepSeek => builder.bearer_auth(&request.api_key),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = retry_after_ms(&response);
            warn!("{} rate limited (retry after {:?}ms)", request.provider, retry_after_ms);
            return Err(TransportError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        debug!("{} responded in {}ms", request.provider, start.elapsed().as_millis());

        parse_response_body(&raw)
    }
}
