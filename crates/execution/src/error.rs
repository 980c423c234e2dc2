// In crates/execution/src/error.rs

use thiserror::Error;

/// Failures of the outbound exchange capabilities.
///
/// `Timeout` and `ConnectionLost` leave the outcome of a write unknown;
/// everything else is definite.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Could not reach the exchange: {0}")]
    Network(String),

    #[error("Connection lost mid-request: {0}")]
    ConnectionLost(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by the exchange")]
    RateLimited,

    #[error("Rejected by the exchange: code {code}, msg: {msg}")]
    Rejected { code: i64, msg: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid price data: {0}")]
    InvalidData(#[from] core_types::Error),
}

impl GatewayError {
    /// True when the request may have taken effect at the exchange.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::ConnectionLost(_))
    }
}

impl From<api_client::Error> for GatewayError {
    fn from(err: api_client::Error) -> Self {
        use api_client::Error as Api;

        if err.is_timeout() {
            return GatewayError::Timeout;
        }
        if err.is_connect() {
            return GatewayError::Network(err.to_string());
        }
        if err.is_outcome_unknown() {
            return GatewayError::ConnectionLost(err.to_string());
        }
        match err {
            Api::RateLimited { .. } => GatewayError::RateLimited,
            Api::ApiError { code, msg } => GatewayError::Rejected { code, msg },
            Api::RequestFailed(e) => GatewayError::ConnectionLost(e.to_string()),
            Api::ClientBuildError(msg) | Api::SigningFailed(msg) => GatewayError::Network(msg),
            other => GatewayError::InvalidResponse(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
