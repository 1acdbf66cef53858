use crate::constants::{
    ERR_BAD_REQUEST, ERR_CONNECTIVITY, ERR_RATE_LIMITED, ERR_SERVICE_UNAVAILABLE, ERR_UNKNOWN,
};
use thiserror::Error;

pub type LuminaResult<T> = Result<T, LuminaError>;

#[derive(Error, Debug)]
pub enum LuminaError {
    #[error("API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("network error: {0}")]
    Network(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("image generation error: {0}")]
    Generation(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LuminaError {
    pub fn api_error(message: impl Into<String>) -> Self {
        LuminaError::Api {
            message: message.into(),
            status: None,
        }
    }

    pub fn api_status_error(status: u16, message: impl Into<String>) -> Self {
        LuminaError::Api {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        LuminaError::Network(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        LuminaError::Config(message.into())
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        LuminaError::Storage(message.into())
    }

    pub fn generation_error(message: impl Into<String>) -> Self {
        LuminaError::Generation(message.into())
    }
}

impl From<reqwest::Error> for LuminaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            LuminaError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            LuminaError::Api {
                message: err.to_string(),
                status: Some(status.as_u16()),
            }
        } else {
            LuminaError::api_error(err.to_string())
        }
    }
}

impl From<sqlx::Error> for LuminaError {
    fn from(err: sqlx::Error) -> Self {
        LuminaError::Storage(err.to_string())
    }
}

/// Buckets a transport failure for user display. Total: every error lands in
/// exactly one category, and classification never fails or re-throws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Connectivity,
    BadRequest,
    RateLimited,
    ServiceUnavailable,
    Unknown,
}

impl ErrorCategory {
    pub fn classify(err: &LuminaError) -> Self {
        match err {
            LuminaError::Network(_) => ErrorCategory::Connectivity,
            LuminaError::Api {
                status: Some(429), ..
            } => ErrorCategory::RateLimited,
            LuminaError::Api {
                status: Some(code), ..
            } if *code >= 400 && *code < 500 => ErrorCategory::BadRequest,
            LuminaError::Api {
                status: Some(code), ..
            } if *code >= 500 && *code < 600 => ErrorCategory::ServiceUnavailable,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::Connectivity => ERR_CONNECTIVITY,
            ErrorCategory::BadRequest => ERR_BAD_REQUEST,
            ErrorCategory::RateLimited => ERR_RATE_LIMITED,
            ErrorCategory::ServiceUnavailable => ERR_SERVICE_UNAVAILABLE,
            ErrorCategory::Unknown => ERR_UNKNOWN,
        }
    }
}
