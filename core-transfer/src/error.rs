//! Error types for listing and upload

use bridge_traits::error::BridgeError;
use thiserror::Error;

use crate::range::TransferRange;

/// Flat classification of [`TransferError`] for callers that only care about
/// the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadServerResponse,
    TransportFailure,
    ProviderReportedError,
    PaginationProtocolError,
    DataSourceFailure,
    Cancelled,
    InvalidArgument,
    Unsupported,
    Internal,
}

/// Errors surfaced by the listing and upload engines
#[derive(Error, Debug)]
pub enum TransferError {
    /// Body could not be parsed or did not make sense for the request
    #[error("Bad server response from {url}{}: {message}", describe_range(.range))]
    BadServerResponse {
        message: String,
        url: String,
        range: Option<TransferRange>,
    },

    /// No response arrived at all
    #[error("Transport failure: {0}")]
    Transport(#[from] BridgeError),

    /// Status/body mapped by the provider adapter
    #[error("Provider error (status {status_code}) for {path}: {message}")]
    ProviderReported {
        status_code: u16,
        message: String,
        path: String,
    },

    /// Server handed back a page token it had already issued
    #[error("Pagination protocol error: token {token:?} was repeated")]
    PaginationProtocol { token: String },

    /// The byte source could not produce the requested range
    #[error("Data source failure for {range}: {message}")]
    DataSource {
        range: TransferRange,
        message: String,
    },

    /// Cancelled by the caller
    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The provider adapter does not implement this capability
    #[error("Operation not supported by provider: {operation}")]
    Unsupported { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_range(range: &Option<TransferRange>) -> String {
    match range {
        Some(range) => format!(" (range {})", range),
        None => String::new(),
    }
}

impl TransferError {
    /// Shorthand for adapters reporting an unparseable body.
    ///
    /// URL and range are filled in by the engine via [`with_context`](Self::with_context).
    pub fn bad_response(message: impl Into<String>) -> Self {
        TransferError::BadServerResponse {
            message: message.into(),
            url: String::new(),
            range: None,
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        TransferError::Unsupported {
            operation: operation.into(),
        }
    }

    /// Attach the request URL and part range to a `BadServerResponse` that
    /// does not carry them yet. Other variants pass through untouched.
    pub fn with_context(self, request_url: &str, part: Option<TransferRange>) -> Self {
        match self {
            TransferError::BadServerResponse {
                message,
                url,
                range,
            } => TransferError::BadServerResponse {
                message,
                url: if url.is_empty() {
                    request_url.to_string()
                } else {
                    url
                },
                range: range.or(part),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::BadServerResponse { .. } => ErrorKind::BadServerResponse,
            TransferError::Transport(_) => ErrorKind::TransportFailure,
            TransferError::ProviderReported { .. } => ErrorKind::ProviderReportedError,
            TransferError::PaginationProtocol { .. } => ErrorKind::PaginationProtocolError,
            TransferError::DataSource { .. } => ErrorKind::DataSourceFailure,
            TransferError::Cancelled => ErrorKind::Cancelled,
            TransferError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TransferError::Unsupported { .. } => ErrorKind::Unsupported,
            TransferError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;
