//! Source adapter error types.

use thiserror::Error;

/// Errors that can occur while fetching from a forecast provider.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure, timeout or a provider that could not be reached
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Provider answered with a non-success status
    #[error("HTTP {status} ({message})")]
    Http { status: u16, message: String },

    /// Response could not be mapped onto the forecast schema
    #[error("Invalid source data: {0}")]
    DataInvalid(String),

    /// Required credentials are missing; the source is never fetched
    #[error("Not configured ({0} missing)")]
    NotConfigured(String),
}

impl SourceError {
    pub fn data_invalid(message: impl Into<String>) -> Self {
        Self::DataInvalid(message.into())
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Whether the provider could not be reached or refused the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Http { .. })
    }

    /// Authentication or authorization was rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }

    /// Whether retrying within the same run can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::DataInvalid(_) | Self::NotConfigured(_) => false,
        }
    }

    /// User-friendly message for the briefing notes.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(msg) => format!("unreachable ({})", msg),
            Self::Http { status: 401, message } | Self::Http { status: 403, message } => {
                format!("auth failed ({})", message)
            }
            Self::Http { status: 429, .. } => "rate limited".to_string(),
            Self::Http { status, message } => format!("HTTP {} ({})", status, message),
            Self::DataInvalid(msg) => format!("unusable response ({})", msg),
            Self::NotConfigured(setting) => format!("not configured ({} missing)", setting),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::DataInvalid(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::http(status.as_u16(), err.to_string());
        }
        if err.is_timeout() {
            return Self::Unavailable("request timed out".to_string());
        }
        Self::Unavailable(err.to_string())
    }
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
