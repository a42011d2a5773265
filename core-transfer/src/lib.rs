//! # Core Transfer
//!
//! Provider-agnostic engines for HTTP/REST cloud drives:
//!
//! - [`Paginator`] walks a cursor-paginated listing to the end, guarding
//!   against servers that repeat a page token.
//! - [`ChunkedUploadSession`] runs one resumable upload in its own task:
//!   session creation, sequential parts, server-dictated continuation ranges,
//!   completion detection and cancellation with best-effort session teardown.
//!
//! Everything service-specific (URLs, headers, JSON) lives in a provider
//! adapter implementing [`ListingAdapter`] and/or [`UploadAdapter`].
//! [`CloudClient`] ties an adapter to an `HttpClient` and tracks running
//! uploads.

pub mod adapter;
pub mod client;
pub mod data_provider;
pub mod error;
pub mod pagination;
pub mod range;
pub mod registry;
pub mod upload;

pub use adapter::{
    with_json_body, DirectoryListing, ListingAdapter, PartOutcome, ProviderAdapter, SessionGrant,
    UploadAdapter, UploadSessionHandle,
};
pub use client::CloudClient;
pub use data_provider::{DataProvider, FileDataProvider, FnDataProvider, MemoryDataProvider};
pub use error::{ErrorKind, Result, TransferError};
pub use pagination::{PageResult, PageSource, PageToken, Paginator};
pub use range::{RangePlan, TransferRange, UploadTarget};
pub use registry::UploadRegistry;
pub use upload::{
    ChunkedUploadSession, UploadHandle, UploadId, UploadObserver, UploadOptions, UploadProgress,
    UploadState, UploadStatus, UploadSummary,
};
