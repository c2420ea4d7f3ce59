//! Kibitz error types

use std::time::Duration;

/// Kibitz error types
#[derive(Debug, thiserror::Error)]
pub enum KibitzError {
    // Upstream / network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The inference endpoint itself answered 429. The local window limiter
    /// never produces this; it waits instead.
    #[error("upstream rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response from model")]
    EmptyResponse,

    // Fatal upstream errors
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Caller / content errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The completion did not look like poker advice.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Terminal form of a retryable error once the attempt cap is reached.
    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<KibitzError>,
    },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration / lifecycle errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("broker shut down before the request completed")]
    Shutdown,

    #[error("request cancelled by caller")]
    Cancelled,
}

/// Coarse classification used by callers to pick a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials rejected. Never retried.
    Auth,
    /// Malformed request, bad caller input or unusable response content.
    Validation,
    /// Network failure, 5xx, timeout or upstream throttling.
    Transient,
    /// A retryable error survived every attempt.
    ExhaustedRetries,
    /// Configuration or lifecycle problems inside the broker.
    Internal,
}

impl KibitzError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationFailed => ErrorKind::Auth,
            Self::InvalidRequest(_) | Self::InvalidInput(_) | Self::InvalidResponse(_) => {
                ErrorKind::Validation
            }
            Self::Http(_)
            | Self::Api { .. }
            | Self::RateLimited { .. }
            | Self::Timeout(_)
            | Self::EmptyResponse => ErrorKind::Transient,
            Self::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
            Self::Json(_) | Self::Configuration(_) | Self::Shutdown | Self::Cancelled => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the error indicates transient unavailability of the endpoint.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Whether the retry policy should attempt the call again.
    ///
    /// Transient errors are retried, and so is [`KibitzError::InvalidResponse`]:
    /// a fresh sample from the model may well be usable.
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || matches!(self, Self::InvalidResponse(_))
    }

    /// Whether this is a validation-class failure, looking through
    /// [`KibitzError::ExhaustedRetries`] to the last underlying error.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::ExhaustedRetries { last, .. } => last.is_validation(),
            other => other.kind() == ErrorKind::Validation,
        }
    }

    /// Server-provided backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map a non-success HTTP status from the inference endpoint.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::AuthenticationFailed,
            408 => Self::Timeout(Duration::ZERO),
            429 => Self::RateLimited { retry_after: None },
            500..=599 => Self::Api { status, message },
            _ => Self::InvalidRequest(format!("{status}: {message}")),
        }
    }
}

/// Result type alias for Kibitz operations
pub type Result<T> = std::result::Result<T, KibitzError>;
