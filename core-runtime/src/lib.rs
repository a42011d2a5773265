//! # Core Runtime
//!
//! Shared plumbing for the transfer engines and provider adapters:
//! validated [`CoreConfig`] (transport plus part/page/timeout settings) and
//! the `tracing` setup in [`logging`].

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, TransferConfig};
pub use error::{Error, Result};
