// tests/transport_test.rs
// OpenAI-compatible transport against a mock HTTP server

use std::time::Duration;

use parley::llm::provider::openai::DEFAULT_AZURE_API_VERSION;
use parley::llm::provider::CompletionRequest;
use parley::llm::{
    CompletionGateway, CompletionTransport, LlmMessage, OpenAiCompatibleTransport, Provider, RotatingCredentialSet,
    TransportError,
};
use serde_json::{json, Map};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> OpenAiCompatibleTransport {
    OpenAiCompatibleTransport::new(Duration::from_secs(5), DEFAULT_AZURE_API_VERSION).unwrap()
}

fn request(provider: Provider, base_url: &str, api_key: &str) -> CompletionRequest {
    CompletionRequest {
        provider,
        model: "gpt-4o".to_string(),
        api_key: api_key.to_string(),
        base_url: Some(base_url.to_string()),
        temperature: 0.0,
        max_tokens: Some(128),
        extra: Map::new(),
        messages: vec![LlmMessage::system("be brief"), LlmMessage::user("hello")],
        tools: vec![],
        response_format: None,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-one"))
        .and(body_partial_json(json!({"model": "gpt-4o", "max_tokens": 128})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi!")))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport()
        .complete(&request(Provider::OpenAi, &server.uri(), "sk-one"))
        .await
        .unwrap();

    assert_eq!(response.content.as_deref(), Some("Hi!"));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn test_429_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
        .mount(&server)
        .await;

    let err = transport()
        .complete(&request(Provider::OpenAi, &server.uri(), "sk-one"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::RateLimited { retry_after_ms: Some(2000) }));
}

#[tokio::test]
async fn test_oversized_retry_after_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "18446744073709551615"))
        .mount(&server)
        .await;

    let err = transport()
        .complete(&request(Provider::OpenAi, &server.uri(), "sk-one"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::RateLimited { retry_after_ms: None }));
}

#[tokio::test]
async fn test_server_error_is_not_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = transport()
        .complete(&request(Provider::DeepSeek, &server.uri(), "sk-one"))
        .await
        .unwrap_err();

    assert!(!err.is_rate_limited());
    assert!(matches!(err, TransportError::RequestFailed { status: 500, ref body } if body == "boom"));
}

#[tokio::test]
async fn test_azure_uses_deployment_path_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4o/chat/completions"))
        .and(query_param("api-version", DEFAULT_AZURE_API_VERSION))
        .and(header("api-key", "azure-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("from azure")))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport()
        .complete(&request(Provider::Azure, &server.uri(), "azure-secret"))
        .await
        .unwrap();

    assert_eq!(response.content.as_deref(), Some("from azure"));
}

#[tokio::test]
async fn test_gateway_rotates_past_rate_limited_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer sk-limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer sk-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<think>ok</think>Rotated.")))
        .expect(1)
        .mount(&server)
        .await;

    let keys = RotatingCredentialSet::new(vec!["sk-limited".to_string(), "sk-fresh".to_string()]).unwrap();
    let mut gateway =
        CompletionGateway::new(Arc::new(transport()), Provider::OpenAi, "gpt-4o", keys).with_base_url(server.uri());

    let message = gateway
        .complete(&[LlmMessage::user("hello")], &[], None)
        .await
        .unwrap();

    assert_eq!(message.content.as_deref(), Some("Rotated."));
    assert_eq!(gateway.credentials().current(), "sk-fresh");
}
