use thiserror::Error;

/// Failures talking to the Bybit REST API.
#[derive(Error, Debug)]
pub enum BybitError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Non-zero `retCode` on an endpoint where that is a hard failure.
    #[error("Bybit API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}
