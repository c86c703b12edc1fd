use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// Errors a single adapter call can produce.
///
/// This is the per-call error a breaker/pool/router wraps; it is
/// deliberately narrower than the router's own error taxonomy, which
/// also has to represent kill-switch/degradation/no-candidate cases
/// that never touch an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connect or read timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("could not parse upstream response: {0}")]
    Protocol(String),

    #[error("{0} does not support this operation")]
    Unsupported(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("connection pool exhausted")]
    PoolExhausted,
}

impl AdapterError {
    /// Whether a retry against a different upstream is worth trying.
    ///
    /// Mirrors the transient/permanent split in the routing layer:
    /// connection failures and 5xx are transient, 4xx are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) | Self::PoolExhausted => true,
            Self::Upstream { status, .. } => *status >= 500,
            Self::Protocol(_) | Self::Unsupported(_) | Self::Cancelled => false,
        }
    }
}

impl From<switchboard_pool::PoolError> for AdapterError {
    fn from(err: switchboard_pool::PoolError) -> Self {
        match err {
            switchboard_pool::PoolError::Exhausted(_) => Self::PoolExhausted,
            switchboard_pool::PoolError::Build(msg) => Self::Transport(msg),
        }
    }
}

impl HttpError for AdapterError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport(_) | Self::Protocol(_) => StatusCode::BAD_GATEWAY,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Protocol(_) => "protocol_error",
            Self::Unsupported(_) => "unsupported_operation",
            Self::Cancelled => "cancelled",
            Self::PoolExhausted => "pool_exhausted",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
