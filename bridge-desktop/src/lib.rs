//! # Desktop Bridge
//!
//! `reqwest`-backed [`HttpClient`](bridge_traits::HttpClient) for macOS,
//! Windows and Linux hosts. `core-runtime` injects it automatically when the
//! `desktop-shims` feature is enabled and no client was configured.
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use core_runtime::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .build()?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
