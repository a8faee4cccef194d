use thiserror::Error;

/// Application-wide error types for Rolodex.
#[derive(Error, Debug)]
pub enum AppError {
    /// Credentials or data folder are missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The queue document exists but is not valid JSON of the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Reading or writing the queue document failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A person record is not well-formed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A selector matched nothing on the current page.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Navigating to a page failed.
    #[error("Navigation error: {0}")]
    NavigationError(String),

    /// The browser process or protocol connection misbehaved.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// A bounded wait expired.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// HTTP request failed (geocoding).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError(e.to_string())
    }
}
