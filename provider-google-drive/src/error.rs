//! Error types for Google Drive provider

use core_transfer::TransferError;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// 429, or 403 with a rate-limit reason
    #[error("Rate limit exceeded (status {status_code}): {message}")]
    RateLimitExceeded { status_code: u16, message: String },

    /// File or folder not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify an error status. The message comes from the Drive error body
    /// when there is one, otherwise the raw body text.
    ///
    /// Drive reports per-user quota exhaustion as `403` with a
    /// `*RateLimitExceeded` reason; those count as rate limiting too.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let (message, rate_limited) = match serde_json::from_slice::<ApiErrorResponse>(body) {
            Ok(response) => {
                let rate_limited = response
                    .error
                    .reason()
                    .is_some_and(|reason| reason.ends_with("ateLimitExceeded"));
                (response.error.message, rate_limited)
            }
            Err(_) => (String::from_utf8_lossy(body).trim().to_string(), false),
        };

        match status {
            401 => GoogleDriveError::AuthenticationFailed(message),
            404 => GoogleDriveError::FileNotFound(message),
            429 => GoogleDriveError::RateLimitExceeded {
                status_code: status,
                message,
            },
            403 if rate_limited => GoogleDriveError::RateLimitExceeded {
                status_code: status,
                message,
            },
            _ => GoogleDriveError::ApiError {
                status_code: status,
                message,
            },
        }
    }

    /// HTTP status this error was derived from, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GoogleDriveError::AuthenticationFailed(_) => Some(401),
            GoogleDriveError::FileNotFound(_) => Some(404),
            GoogleDriveError::RateLimitExceeded { status_code, .. }
            | GoogleDriveError::ApiError { status_code, .. } => Some(*status_code),
            GoogleDriveError::ParseError(_) | GoogleDriveError::BridgeError(_) => None,
        }
    }

    /// Convert for the transfer engines, naming the path the request was for
    pub fn into_transfer_error(self, path: &str) -> TransferError {
        match self {
            GoogleDriveError::ParseError(message) => TransferError::bad_response(message),
            GoogleDriveError::BridgeError(e) => TransferError::Transport(e),
            other => TransferError::ProviderReported {
                status_code: other.status_code().unwrap_or_default(),
                message: other.to_string(),
                path: path.to_string(),
            },
        }
    }
}

impl From<GoogleDriveError> for TransferError {
    fn from(error: GoogleDriveError) -> Self {
        error.into_transfer_error("")
    }
}
