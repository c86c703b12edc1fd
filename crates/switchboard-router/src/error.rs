use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// The router's full error taxonomy.
///
/// Broader than [`switchboard_adapters::AdapterError`]: it also has to
/// represent decisions made before an adapter is ever called (no
/// candidate, kill switch, degraded feature) and the terminal
/// "every candidate failed" case after a retry loop exhausts itself.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no engine available for model {model_id}")]
    NoEngineAvailable { model_id: String },

    #[error("kill switch is enabled")]
    KillSwitchEnabled,

    #[error("feature unavailable at current degradation level")]
    FeatureDegraded,

    #[error("circuit breaker open for this upstream")]
    BreakerOpen,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("upstream returned {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("could not parse upstream response: {0}")]
    ProtocolError(String),

    #[error("operation not supported by this engine: {0}")]
    Unsupported(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("job queue is full")]
    QueueFull,

    #[error("all {attempts} candidate engines failed: {source}")]
    AllEnginesFailed { attempts: u32, source: Box<Self> },

    #[error("stream was interrupted after the first chunk")]
    StreamInterrupted,
}

impl RouterError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::TransportError(_) | Self::BreakerOpen | Self::PoolExhausted => true,
            Self::UpstreamError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    pub(crate) fn from_adapter(err: switchboard_adapters::AdapterError) -> Self {
        use switchboard_adapters::AdapterError as A;
        match err {
            A::Timeout => Self::Timeout,
            A::Transport(msg) => Self::TransportError(msg),
            A::Upstream { status, body } => Self::UpstreamError { status, body },
            A::Protocol(msg) => Self::ProtocolError(msg),
            A::Unsupported(msg) => Self::Unsupported(msg),
            A::Cancelled => Self::Cancelled,
            A::PoolExhausted => Self::PoolExhausted,
        }
    }
}

impl HttpError for RouterError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoEngineAvailable { .. } => StatusCode::NOT_FOUND,
            Self::KillSwitchEnabled | Self::FeatureDegraded => StatusCode::SERVICE_UNAVAILABLE,
            Self::BreakerOpen | Self::PoolExhausted | Self::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::TransportError(_) | Self::ProtocolError(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamError { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::AllEnginesFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Cancelled | Self::StreamInterrupted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::NoEngineAvailable { .. } => "no_engine_available",
            Self::KillSwitchEnabled => "kill_switch_enabled",
            Self::FeatureDegraded => "feature_degraded",
            Self::BreakerOpen => "breaker_open",
            Self::Timeout => "timeout",
            Self::TransportError(_) => "transport_error",
            Self::UpstreamError { .. } => "upstream_error",
            Self::ProtocolError(_) => "protocol_error",
            Self::Unsupported(_) => "unsupported_operation",
            Self::Cancelled => "cancelled",
            Self::PoolExhausted => "pool_exhausted",
            Self::QueueFull => "queue_full",
            Self::AllEnginesFailed { .. } => "all_engines_failed",
            Self::StreamInterrupted => "stream_interrupted",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_5xx_is_retryable() {
        let err = RouterError::UpstreamError {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn upstream_4xx_is_not_retryable() {
        let err = RouterError::UpstreamError {
            status: 400,
            body: "bad prompt".to_owned(),
        };
        assert!(!err.is_retryable());
        assert!(err.is_permanent());
    }
}
