//! Dispatcher integration tests.
//!
//! Each provider is pointed at a wiremock server through config overrides.
//! Tests cover wire shape and auth headers per provider, text
//! normalization, status mapping, and deadlines.

use std::time::Duration;

use serde_json::json;
use truthmeter::config::{Config, Credentials};
use truthmeter::providers::{DispatchError, Dispatcher, ProviderError, ProviderKind};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(provider: &str, server: &MockServer) -> Config {
    Config::from_toml(&format!(
        "[providers.{}]\nbase_url = \"{}\"\n",
        provider,
        server.uri()
    ))
    .expect("valid config")
}

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "served-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3}
    })
}

#[tokio::test]
async fn test_openai_answer_is_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer openai-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "What is 2+2?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("2+2 equals 4.")))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("openai", &server),
        &Credentials::default().with("OPENAI_API_KEY", "openai-key"),
    );
    let candidate = dispatcher.dispatch(ProviderKind::OpenAI, "auto", "What is 2+2?").await;

    assert!(!candidate.dispatch_failed);
    assert_eq!(candidate.text, "2+2 equals 4.");
    assert_eq!(candidate.model_resolved, "gpt-4o");
}

#[tokio::test]
async fn test_meta_goes_through_groq_with_its_own_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer groq-key"))
        .and(body_partial_json(json!({"model": "llama-3.1-70b-versatile"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Four")))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("meta", &server),
        &Credentials::default().with("GROQ_API_KEY", "groq-key"),
    );
    let candidate = dispatcher.dispatch(ProviderKind::Meta, "auto", "What is 2+2?").await;

    assert_eq!(candidate.text, "Four");
    assert_eq!(candidate.label(), "meta/llama-3.1-70b-versatile");
}

#[tokio::test]
async fn test_deepseek_explicit_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer deepseek-key"))
        .and(body_partial_json(json!({"model": "deepseek-reasoner"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("4")))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("deepseek", &server),
        &Credentials::default().with("DEEPSEEK_API_KEY", "deepseek-key"),
    );
    let candidate = dispatcher
        .dispatch(ProviderKind::DeepSeek, "deepseek-reasoner", "What is 2+2?")
        .await;

    assert_eq!(candidate.text, "4");
    assert_eq!(candidate.model_resolved, "deepseek-reasoner");
}

#[tokio::test]
async fn test_anthropic_text_blocks_are_joined() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "anthropic-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-sonnet-4-5", "max_tokens": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "text", "text": "The answer "},
                {"type": "text", "text": "is 4."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("anthropic", &server),
        &Credentials::default().with("ANTHROPIC_API_KEY", "anthropic-key"),
    );
    let candidate = dispatcher.dispatch(ProviderKind::Anthropic, "auto", "What is 2+2?").await;

    assert_eq!(candidate.text, "The answer is 4.");
}

#[tokio::test]
async fn test_google_parts_are_joined() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "google-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Capital of France?"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Paris"}, {"text": "."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2},
            "modelVersion": "gemini-2.5-flash"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("google", &server),
        &Credentials::default().with("GOOGLE_API_KEY", "google-key"),
    );
    let candidate = dispatcher.dispatch(ProviderKind::Google, "auto", "Capital of France?").await;

    assert_eq!(candidate.text, "Paris.");
}

#[tokio::test]
async fn test_server_error_becomes_candidate_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "internal failure"}})),
        )
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("openai", &server),
        &Credentials::default().with("OPENAI_API_KEY", "openai-key"),
    );
    let candidate = dispatcher.dispatch(ProviderKind::OpenAI, "gpt-4o", "q").await;

    assert!(candidate.dispatch_failed);
    assert_eq!(candidate.text, "Error calling gpt-4o: API error: 500 - internal failure");
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "throttled"})))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "forbidden"})))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "empty"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        &config_for("openai", &server),
        &Credentials::default().with("OPENAI_API_KEY", "openai-key"),
    );

    let err = dispatcher
        .try_dispatch(ProviderKind::OpenAI, "throttled", "q")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Transport {
            source: ProviderError::RateLimited { retry_after_ms: 7000 },
            ..
        }
    ));

    let err = dispatcher
        .try_dispatch(ProviderKind::OpenAI, "forbidden", "q")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Transport {
            source: ProviderError::Config(_),
            ..
        }
    ));

    let err = dispatcher
        .try_dispatch(ProviderKind::OpenAI, "empty", "q")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Transport {
            source: ProviderError::Parse(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_hung_provider_hits_deadline() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = Config::from_toml(&format!(
        "[providers.openai]\nbase_url = \"{}\"\n\n[runner]\ntimeout_ms = 100\n",
        server.uri()
    ))
    .expect("valid config");
    let dispatcher = Dispatcher::new(&config, &Credentials::default().with("OPENAI_API_KEY", "k"));

    let candidate = dispatcher.dispatch(ProviderKind::OpenAI, "gpt-4o", "q").await;
    assert!(candidate.dispatch_failed);
    assert_eq!(candidate.text, "Error calling gpt-4o: Timeout after 100ms");
}
