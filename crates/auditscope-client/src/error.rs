//! Error types for endpoint operations.

use thiserror::Error;

/// Result type for endpoint operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the audit log endpoints.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    #[error("Request to audit log service failed: {source}")]
    Request {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("HTTP error from audit log service: {status} - {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// Error message.
        message: String,
    },

    /// The live event stream failed.
    #[error("Event stream error: {message}")]
    Stream {
        /// Error message.
        message: String,
    },

    /// The configured base URL is not usable.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// The client configuration is invalid.
    #[error("Invalid client configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}

impl ClientError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Returns true if repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { source } => source.is_timeout() || source.is_connect(),
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Stream { .. } => true,
            Self::Decode { .. } | Self::InvalidUrl { .. } | Self::InvalidConfig { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::Request { source: err }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<auditscope_core::Error> for ClientError {
    fn from(err: auditscope_core::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}
