use serde::Deserialize;

/// A field-level validation failure reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every failure a backend call can produce, classified once at the
/// normalization boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Insufficient credits: {message}")]
    InsufficientCredits {
        message: String,
        required: Option<u64>,
        available: Option<u64>,
    },
    #[error("Network error: {message}")]
    Network { message: String },
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("Not found: {message}")]
    NotFound { message: String },
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Malformed response: {message}")]
    Decode { message: String },
}

/// Error details as the backend sends them, in either envelope
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct ErrorDetail {
    pub message: Option<String>,
    pub code: Option<String>,
    pub required: Option<u64>,
    pub available: Option<u64>,
    pub fields: Vec<FieldError>,
}

const CODE_INSUFFICIENT_CREDITS: &str = "INSUFFICIENT_CREDITS";
const CODE_VALIDATION: &str = "VALIDATION_ERROR";
const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
const CODE_NOT_FOUND: &str = "NOT_FOUND";

impl ApiError {
    /// Classify a failed call from its HTTP status and the backend's error code
    pub(crate) fn classify(status: u16, detail: ErrorDetail) -> Self {
        let message = detail
            .message
            .clone()
            .unwrap_or_else(|| format!("HTTP {}", status));

        match (detail.code.as_deref(), status) {
            (Some(CODE_INSUFFICIENT_CREDITS), _) | (_, 402) => ApiError::InsufficientCredits {
                message,
                required: detail.required,
                available: detail.available,
            },
            (Some(CODE_VALIDATION), _) | (_, 400) | (_, 422) => ApiError::Validation {
                message,
                fields: detail.fields,
            },
            (Some(CODE_UNAUTHORIZED), _) | (_, 401) | (_, 403) => {
                ApiError::Unauthorized { message }
            }
            (Some(CODE_NOT_FOUND), _) | (_, 404) => ApiError::NotFound { message },
            (_, s) if s >= 500 => ApiError::Server { status, message },
            _ => ApiError::Rejected { status, message },
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        ApiError::Network {
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(err: serde_json::Error) -> Self {
        ApiError::Decode {
            message: err.to_string(),
        }
    }

    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, ApiError::InsufficientCredits { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Message suitable for a toast
    pub fn user_message(&self) -> String {
        match self {
            ApiError::InsufficientCredits { message, .. }
            | ApiError::Validation { message, .. }
            | ApiError::Unauthorized { message }
            | ApiError::NotFound { message }
            | ApiError::Server { message, .. }
            | ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Network { .. } => "The server could not be reached".to_string(),
            ApiError::Decode { .. } => "Unexpected response from the server".to_string(),
        }
    }
}
