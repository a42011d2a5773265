use core_transfer::TransferError;
use thiserror::Error;

use crate::types::GraphErrorResponse;

#[derive(Error, Debug)]
pub enum OneDriveError {
    #[error("API request failed (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid Graph response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, OneDriveError>;

impl OneDriveError {
    /// Classify an error status using the Graph error envelope when present
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = match serde_json::from_slice::<GraphErrorResponse>(body) {
            Ok(e) if e.error.code.is_empty() => e.error.message,
            Ok(e) => format!("{}: {}", e.error.code, e.error.message),
            Err(_) => String::from_utf8_lossy(body).trim().to_string(),
        };

        match status {
            401 => OneDriveError::AuthRequired(message),
            404 => OneDriveError::NotFound(message),
            429 => OneDriveError::Throttled(message),
            _ => OneDriveError::ApiError {
                status_code: status,
                message,
            },
        }
    }

    pub fn into_transfer_error(self, path: &str) -> TransferError {
        let status_code = match &self {
            OneDriveError::ApiError { status_code, .. } => *status_code,
            OneDriveError::Throttled(_) => 429,
            OneDriveError::AuthRequired(_) => 401,
            OneDriveError::NotFound(_) => 404,
            OneDriveError::InvalidResponse(message) => {
                return TransferError::bad_response(message.clone())
            }
        };

        TransferError::ProviderReported {
            status_code,
            message: self.to_string(),
            path: path.to_string(),
        }
    }
}

impl From<OneDriveError> for TransferError {
    fn from(error: OneDriveError) -> Self {
        error.into_transfer_error("")
    }
}
