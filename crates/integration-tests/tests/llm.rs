//! Non-streaming chat/completions behavior: spec.md S1 and universal
//! properties 1 (`response.engine` names the upstream that served it)
//! and 5 (`total_tokens == prompt_tokens + completion_tokens`).

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_upstream::{EngineKind, MockUpstream};
use harness::server::TestServer;
use switchboard_core::EngineType;

fn chat_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "hi"}],
        "stream": false,
    })
}

/// S1 — single healthy engine.
#[tokio::test]
async fn single_healthy_engine_returns_response() {
    let mock = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Vllm, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("m1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["engine"], "vllm");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert!(json["usage"]["total_tokens"].as_u64().unwrap() > 0);
}

/// Universal property 5: usage invariant holds on every non-streaming
/// response, independent of which engine served it.
#[tokio::test]
async fn usage_total_is_prompt_plus_completion() {
    let mock = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Sglang, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("m1"))
        .send()
        .await
        .unwrap();

    let json: serde_json::Value = resp.json().await.unwrap();
    let usage = &json["usage"];
    let prompt = usage["prompt_tokens"].as_u64().unwrap();
    let completion = usage["completion_tokens"].as_u64().unwrap();
    let total = usage["total_tokens"].as_u64().unwrap();
    assert_eq!(total, prompt + completion);
}

#[tokio::test]
async fn unknown_model_returns_not_found() {
    let mock = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Vllm, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("does-not-exist"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "no_engine_available");
}

#[tokio::test]
async fn plain_completions_endpoint_resolves_separately() {
    let mock = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Vllm, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let body = serde_json::json!({ "model": "m1", "prompt": "hi", "stream": false });
    let resp = server.client().post(server.url("/v1/completions")).json(&body).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"].as_array().unwrap().len(), 1);
}
