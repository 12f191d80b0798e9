use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Connection, TLS or request-level timeout talking to the daemon
    #[error("Request to transmission failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon rejected the configured credentials
    #[error("Transmission rejected the configured credentials")]
    Unauthorized,

    /// The daemon answered with an unexpected HTTP status
    #[error("Transmission returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// A 409 answer that did not carry a session id to retry with
    #[error("Transmission answered 409 without an X-Transmission-Session-Id header")]
    MissingSessionId,

    /// The RPC envelope reported something other than "success"
    #[error("{method} failed: {result}")]
    Rpc { method: String, result: String },

    /// The RPC succeeded but carried no arguments object
    #[error("{method} returned no arguments")]
    MissingArguments { method: String },

    /// The response body did not match the expected shape
    #[error("Failed to decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// A collection step ran past its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Metric construction or encoding error
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// Configuration loaded but is not usable
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Transport(_)
            | Error::Unauthorized
            | Error::Status { .. }
            | Error::MissingSessionId
            | Error::Rpc { .. }
            | Error::MissingArguments { .. }
            | Error::Decode { .. } => StatusCode::BAD_GATEWAY,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Metrics(_) | Error::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a scraper-safe message, without leaking daemon URLs or response bodies
    pub fn user_message(&self) -> String {
        match self {
            Error::Timeout { operation, .. } => format!("{operation} timed out"),
            Error::Metrics(_) | Error::InvalidConfig { .. } => "Internal server error".to_string(),
            _ => "Transmission is unavailable".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Metrics(_) | Error::InvalidConfig { .. } => {
                tracing::error!("Internal exporter error: {:#}", self);
            }
            _ => {
                tracing::warn!("Upstream error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for exporter operation results
pub type Result<T> = std::result::Result<T, Error>;
