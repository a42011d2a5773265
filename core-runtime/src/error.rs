use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors raised while assembling or validating the runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("`{field}` {message}")]
    InvalidSetting {
        field: &'static str,
        message: String,
    },

    #[error("no {capability} available: {message}")]
    CapabilityMissing {
        capability: &'static str,
        message: String,
    },

    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global `tracing` subscriber was already installed
    #[error("logging already initialized: {0}")]
    LoggingInit(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidSetting {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
