use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use switchboard_core::HttpError;
use switchboard_router::RouterError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

/// Wraps any [`HttpError`] so handlers can propagate it with `?` and
/// have it render as a JSON error body with the right status code.
pub struct ApiError(pub RouterError);

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.0.client_message(),
                error_type: self.0.error_type().to_owned(),
            },
        };
        (status, Json(body)).into_response()
    }
}
