use thiserror::Error;

/// Failure talking to the notifications REST endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No CSRF token available for mutating request")]
    MissingCsrfToken,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Failure of the push channel. The channel is never reopened.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    #[error("Push channel closed (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("Push channel error: {0}")]
    Protocol(String),
}
