use serde::Deserialize;
use thiserror::Error;

use crate::auth::StoreError;

/// Login failures. A failed login never touches the stored session.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Could not save session: {0}")]
    Storage(#[from] StoreError),
}

/// Refresh failures. Anything but `Network` or `SessionChanged` ends the
/// session.
///
/// Cloneable so one in-flight refresh can report to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token found")]
    NoRefreshToken,

    #[error("Refresh token has expired")]
    RefreshTokenExpired,

    #[error("Session expired. Please log in again.")]
    Rejected,

    #[error("Network error during refresh: {0}")]
    Network(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Could not save refreshed token: {0}")]
    Storage(String),

    /// The store was cleared or logged into again while the request ran
    #[error("Session changed during refresh")]
    SessionChanged,
}

impl RefreshError {
    /// Whether the stored credentials are known to be unusable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RefreshError::Network(_) | RefreshError::SessionChanged)
    }
}

/// Failures of authenticated and account calls.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error(transparent)]
    SessionExpired(#[from] RefreshError),

    #[error("{0}")]
    Rejected(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message fields the API uses on failure, in order of preference.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    detail: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable message out of an error body.
    pub fn server_message(body: &str) -> String {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        parsed
            .error
            .or(parsed.message)
            .or(parsed.detail)
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 | 403 | 409 | 422 => ApiError::Rejected(Self::server_message(body)),
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(Self::truncate_body(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// Whether the caller should send the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        match self {
            ApiError::NotLoggedIn | ApiError::Unauthorized => true,
            ApiError::SessionExpired(e) => e.is_terminal(),
            _ => false,
        }
    }
}
