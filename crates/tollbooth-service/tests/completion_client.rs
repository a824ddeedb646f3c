//! Completion client tests against a mock provider.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tollbooth_service::llm::{CompletionClient, CompletionGateway};

fn client(server: &MockServer) -> CompletionClient {
    CompletionClient::new("sk-test", server.uri(), "test-model").expect("client builds")
}

#[tokio::test]
async fn completion_parses_output_and_token_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-model-2024",
            "choices": [
                {"message": {"role": "assistant", "content": "hi there"}}
            ],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let completion = client(&server).complete("hello").await.unwrap();

    assert_eq!(completion.output, "hi there");
    assert_eq!(completion.tokens_used, 7);
    assert_eq!(completion.model, "test-model-2024");
}

#[tokio::test]
async fn provider_error_status_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "rate limited"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).complete("hello").await.unwrap_err();
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn missing_usage_block_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-model",
            "choices": [
                {"message": {"role": "assistant", "content": "hi"}}
            ]
        })))
        .mount(&server)
        .await;

    // A completion that cannot be metered must not be treated as free.
    let err = client(&server).complete("hello").await.unwrap_err();
    assert!(err.to_string().contains("usage"));
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-model",
            "choices": [],
            "usage": {"total_tokens": 0}
        })))
        .mount(&server)
        .await;

    let err = client(&server).complete("hello").await.unwrap_err();
    assert!(err.to_string().contains("content"));
}
