//! `/health`, S5 (kill switch), S6 (round-robin fairness), and
//! universal property 6 (breaker reopens to `HalfOpen` after the
//! recovery window elapses).

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

#[tokio::test]
async fn health_endpoint_reports_ok_with_configured_upstream() {
    let mock = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Vllm, mock.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}

/// S5 — the kill switch short-circuits every request before any
/// upstream is consulted.
#[tokio::test]
async fn kill_switch_rejects_without_contacting_upstream() {
    let mock = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Vllm, mock.endpoint(), &[("m1", 1)])
        .with_kill_switch(true)
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("m1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "kill_switch_enabled");
    assert_eq!(mock.request_count(), 0);

    // `/health` also reports unavailable while the kill switch is on.
    let health = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 503);
}

/// S6 — with two equal-priority healthy entries, 100 requests split
/// close to evenly between them (each between 48 and 52 inclusive,
/// i.e. within 2 of the exact 50/50 split).
#[tokio::test]
async fn round_robin_splits_load_evenly_across_equal_priority_tier() {
    let a = MockUpstream::start(EngineKind::OpenAi).await.unwrap();
    let b = MockUpstream::start(EngineKind::Tgi).await.unwrap();

    let config = ConfigBuilder::new()
        .with_engine(EngineType::Vllm, a.endpoint(), &[("m1", 1)])
        .with_engine(EngineType::Tgi, b.endpoint(), &[("m1", 1)])
        .build();
    let server = TestServer::start(config).await.unwrap();

    for _ in 0..100 {
        let resp = server
            .client()
            .post(server.url("/v1/chat/completions"))
            .json(&chat_body("m1"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let count_a = a.request_count();
    let count_b = b.request_count();
    assert_eq!(count_a + count_b, 100);
    assert!((48..=52).contains(&count_a), "engine a served {count_a}/100 requests");
    assert!((48..=52).contains(&count_b), "engine b served {count_b}/100 requests");
}

/// Universal property 6: once the recovery window elapses, a
/// previously-opened breaker admits a probe again (`HalfOpen`) instead
/// of staying permanently `Open`.
#[tokio::test]
async fn breaker_transitions_to_half_open_after_recovery() {
    let failing = MockUpstream::start_failing(EngineKind::Tgi, 10).await.unwrap();
    let backup = MockUpstream::start(EngineKind::Ollama).await.unwrap();

    // Health quarantine (100ms) elapses well before breaker recovery
    // (300ms) so the two mechanisms can be told apart: a request
    // between the two windows proves the health quarantine alone
    // isn't what's keeping tgi out, the breaker still is.
    let config = ConfigBuilder::new()
        .with_engine(EngineType::Tgi, failing.endpoint(), &[("m1", 2)])
        .with_engine(EngineType::Ollama, backup.endpoint(), &[("m1", 1)])
        .with_breaker_error_threshold(1)
        .with_breaker_recovery("300ms")
        .with_health_quarantine("100ms")
        .build();
    let server = TestServer::start(config).await.unwrap();

    // Trips tgi's breaker; ollama is the fallback tier.
    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("m1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(failing.request_count(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    // Health quarantine has lapsed so tgi is back in the candidate
    // list, but the breaker (recovery 300ms) is still `Open`: the
    // call is rejected before ever reaching the adapter.
    let resp2 = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("m1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp2.status(), 200);
    assert_eq!(failing.request_count(), 1, "breaker still open, tgi must not be called");

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    // Past the recovery window the breaker is `HalfOpen` and admits
    // one probe; tgi is still failing, so the probe itself fails and
    // the request falls over to ollama, but tgi's adapter was reached
    // this time, proving the breaker let a call through again.
    let resp3 = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&chat_body("m1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp3.status(), 200);
    assert_eq!(failing.request_count(), 2, "half-open probe should have reached tgi");
}
