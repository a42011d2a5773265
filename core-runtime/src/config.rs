//! # Core Configuration Module
//!
//! Provides configuration management for the cloud drive core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the transport bridge and the transfer settings. It
//! enforces fail-fast validation so a misconfigured part size is reported at
//! startup rather than in the middle of an upload.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - required; with the `desktop-shims` feature a reqwest-based
//!   client is injected when none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TransferConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .transfer(TransferConfig::default().with_default_part_size(5 * 1024 * 1024))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::HttpClient;
use std::sync::Arc;
use std::time::Duration;

/// Default upload part size (10 MiB)
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Largest part size any supported provider accepts (60 MiB, OneDrive)
pub const MAX_PART_SIZE: u64 = 60 * 1024 * 1024;

/// Default number of entries requested per listing page
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Settings consumed by the listing and upload engines and by provider
/// adapters when they build requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Part size requested from providers that let the client choose.
    /// Adapters round it to the provider's required multiple.
    pub default_part_size: u64,

    /// Upper bound on part size
    pub max_part_size: u64,

    /// Entries requested per listing page
    pub page_size: u32,

    /// Per-request timeout attached to every request an adapter builds
    pub request_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_part_size: DEFAULT_PART_SIZE,
            max_part_size: MAX_PART_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl TransferConfig {
    pub fn with_default_part_size(mut self, bytes: u64) -> Self {
        self.default_part_size = bytes;
        self
    }

    pub fn with_max_part_size(mut self, bytes: u64) -> Self {
        self.max_part_size = bytes;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Round `default_part_size` down to a multiple of `granularity`,
    /// never below one granule and never above `max_part_size`.
    pub fn part_size_aligned(&self, granularity: u64) -> u64 {
        let granularity = granularity.max(1);
        let capped = self.default_part_size.min(self.max_part_size);
        ((capped / granularity) * granularity).max(granularity)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_part_size == 0 {
            return Err(Error::invalid("default_part_size", "must be greater than 0 bytes"));
        }

        if self.default_part_size > self.max_part_size {
            return Err(Error::invalid(
                "default_part_size",
                format!(
                    "{} bytes exceeds max_part_size of {} bytes",
                    self.default_part_size, self.max_part_size
                ),
            ));
        }

        if self.page_size == 0 {
            return Err(Error::invalid("page_size", "must be greater than 0"));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::invalid("request_timeout", "must be non-zero"));
        }

        Ok(())
    }
}

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client every engine and adapter sends requests through
    pub http_client: Arc<dyn HttpClient>,

    /// Listing and upload settings
    pub transfer: TransferConfig,

    /// Logging settings, applied by `core_runtime::logging::init_logging`
    pub logging: LoggingConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("transfer", &self.transfer)
            .field("logging", &self.logging)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.transfer.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient",
        message: "enable the 'desktop-shims' feature for ReqwestHttpClient, \
                  or inject one with .http_client()"
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    Ok(Arc::new(ReqwestHttpClient::new()?))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    transfer: Option<TransferConfig>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets listing and upload settings.
    pub fn transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// Sets logging settings.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` if no `HttpClient` was provided and no desktop
    ///   default is available
    /// - `InvalidSetting` if the transfer settings are inconsistent
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            http_client,
            transfer: self.transfer.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
