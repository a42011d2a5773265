//! # Host Bridge Traits
//!
//! What the transfer core needs from the machine it runs on, expressed as
//! traits plus a few plain data types. The core never links a network stack
//! directly.
//!
//! - [`HttpClient`] sends one request and returns whatever the server answered.
//! - [`LoggerSink`] receives log records mirrored out of `tracing`.
//! - [`RemoteFile`] is the provider-neutral listing entry.
//!
//! `bridge-desktop` implements [`HttpClient`] on top of `reqwest`. Embedding
//! hosts can supply their own; tests use scripted in-memory clients.
//!
//! All implementations must be `Send + Sync`. An upload runs as a spawned
//! task and shares the client with every other transfer of the same
//! `CloudClient`.
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::{BridgeError, HttpClient, HttpRequest, HttpResponse};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl HttpClient for Offline {
//!     async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
//!         Err(BridgeError::Connect(request.url))
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod log_sink;
pub mod storage;

pub use error::BridgeError;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log_sink::{LogLevel, LogRecord, LoggerSink, StderrSink};
pub use storage::RemoteFile;
