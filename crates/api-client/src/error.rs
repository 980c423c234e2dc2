// In crates/api-client/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build the API client: {0}")]
    ClientBuildError(String),
    #[error("Failed to sign request: {0}")]
    SigningFailed(String),
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
    #[error("Order acknowledgement could not be read: {0}")]
    UnreadableAck(#[source] serde_json::Error),
    #[error("Unexpected value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("API error: code {code}, msg: {msg}")]
    ApiError { code: i64, msg: String },
    #[error("Rate limited by the exchange (HTTP {status})")]
    RateLimited { status: u16 },
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

impl Error {
    /// The request never reached the exchange.
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::RequestFailed(e) if e.is_connect())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::RequestFailed(e) if e.is_timeout())
    }

    /// The exchange answered, but the answer does not say whether the request
    /// took effect: a 5xx, an "execution status unknown" code (-1007), an
    /// internal error (-1001) or an order ack that does not parse.
    pub fn is_outcome_unknown(&self) -> bool {
        match self {
            Error::HttpStatus { status, .. } => *status >= 500,
            Error::ApiError { code, .. } => matches!(code, -1007 | -1001),
            Error::UnreadableAck(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
