use axum::Json;
use axum::extract::State;
use http::StatusCode;
use serde::Serialize;
use switchboard_health::Status;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

/// 200 when the kill switch is off and at least one registered
/// upstream is not `Down`; 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthBody>) {
    let any_healthy = state.health.snapshot().values().any(|status| *status != Status::Down);
    let healthy = !state.fault.kill_switch_enabled() && any_healthy;

    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthBody {
        status: if healthy { "ok" } else { "unavailable" },
    };
    (status, Json(body))
}
