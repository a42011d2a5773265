use thiserror::Error;

/// Failure of a host capability, before any server response was obtained.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide the capability at all (e.g. client construction failed)
    #[error("capability not available: {0}")]
    NotAvailable(String),

    /// Could not reach the server
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether sending the same request again could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Connect(_) | BridgeError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
