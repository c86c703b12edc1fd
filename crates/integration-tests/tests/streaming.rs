//! S4 (Ollama's newline-delimited stream mapped onto SSE) and
//! universal property 2 (exactly one terminal chunk, and it's last).

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_upstream::{EngineKind, MockUpstream};
use harness::server::TestServer;
use switchboard_core::EngineType;

fn streaming_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "hi"}],
        "stream": true,
    })
}

fn parse_sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.starts_with("data: "))
        .map(|line| line.trim_start_matches("data: ").to_owned())
        .collect()
}

#[tokio::test]
async fn streaming_has_event_stream_content_type() {
    let mock = MockUpstream::start(EngineKind::Ollama).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Ollama, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&streaming_body("m1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let content_type = resp.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(content_type.contains("text/event-stream"), "got {content_type}");
}

/// S4 — Ollama's ndjson stream (two lines, content split "he"/"llo")
/// reaches the caller as two SSE chunks followed by `[DONE]`.
#[tokio::test]
async fn ollama_ndjson_stream_maps_to_two_chunks_then_done() {
    let mock = MockUpstream::start_with_response(EngineKind::Ollama, "he||llo").await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Ollama, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&streaming_body("m1"))
        .send()
        .await
        .unwrap();

    let text = resp.text().await.unwrap();
    let events = parse_sse_data(&text);

    assert_eq!(events.last().map(String::as_str), Some("[DONE]"), "stream must end with [DONE]");

    let chunks: Vec<serde_json::Value> = events[..events.len() - 1]
        .iter()
        .map(|e| serde_json::from_str(e).expect("valid chunk JSON"))
        .collect();

    assert_eq!(chunks.len(), 2, "expected exactly two content chunks, got {chunks:?}");
    assert_eq!(chunks[0]["delta"]["content"], "he");
    assert!(chunks[0]["finish_reason"].is_null());
    assert_eq!(chunks[1]["delta"]["content"], "llo");
    assert_eq!(chunks[1]["finish_reason"], "stop");
}

/// Universal property 2: exactly one terminal chunk (`finish_reason`
/// set), and it is the last chunk before `[DONE]`.
#[tokio::test]
async fn exactly_one_terminal_chunk_and_it_is_last() {
    let mock = MockUpstream::start_with_response(EngineKind::Ollama, "one||two||three").await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Ollama, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&streaming_body("m1"))
        .send()
        .await
        .unwrap();

    let text = resp.text().await.unwrap();
    let events = parse_sse_data(&text);
    let chunks: Vec<serde_json::Value> = events
        .iter()
        .filter(|e| e.as_str() != "[DONE]")
        .map(|e| serde_json::from_str(e).expect("valid chunk JSON"))
        .collect();

    let terminal_positions: Vec<usize> =
        chunks.iter().enumerate().filter(|(_, c)| !c["finish_reason"].is_null()).map(|(i, _)| i).collect();

    assert_eq!(terminal_positions.len(), 1, "expected exactly one terminal chunk, got {terminal_positions:?}");
    assert_eq!(terminal_positions[0], chunks.len() - 1, "terminal chunk must be last");
}

/// Non-streaming engines (TGI with streaming disabled in config) have
/// no `Capability::Streaming` entry, so a streaming request resolves
/// to zero candidates rather than silently falling back to a
/// non-streaming call.
#[tokio::test]
async fn streaming_unavailable_when_engine_streaming_disabled() {
    let mock = MockUpstream::start(EngineKind::Ollama).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Ollama, mock.endpoint(), &[("m1", 1)])
        .without_streaming()
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&streaming_body("m1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
