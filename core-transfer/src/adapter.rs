//! # Provider Adapter Capabilities
//!
//! A provider adapter is the only place that knows a service's URLs, headers
//! and JSON shapes. The engines call into it through two capability traits:
//!
//! - [`ListingAdapter`] for paginated directory listings
//! - [`UploadAdapter`] for resumable chunked uploads
//!
//! A provider implements only the methods it supports. Every capability
//! method has a default that returns [`TransferError::Unsupported`], so a
//! missing override fails the operation instead of the process.

use bridge_traits::http::{HttpRequest, HttpResponse};
use bridge_traits::storage::RemoteFile;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

use crate::error::{Result, TransferError};
use crate::pagination::{PageResult, PageSource};
use crate::range::TransferRange;

/// Opaque server-issued identifier of an upload session.
///
/// Usually a pre-authorized URL, so `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UploadSessionHandle(String);

impl UploadSessionHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UploadSessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UploadSessionHandle([REDACTED])")
    }
}

/// Attach `body` to `request` as JSON.
///
/// A body that cannot be encoded is reported as
/// [`TransferError::InvalidArgument`]; nothing was sent.
pub fn with_json_body<T: Serialize>(request: HttpRequest, body: &T) -> Result<HttpRequest> {
    request
        .json(body)
        .map_err(|e| TransferError::InvalidArgument(e.to_string()))
}

/// What the server granted when the session was created
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub session: UploadSessionHandle,
    /// Part size to use for this upload; clipped to the total size by the engine
    pub part_size: u64,
}

/// Interpretation of one part response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartOutcome {
    /// Part stored, the client picks the next range itself
    Accepted,

    /// The server dictates the next range to send, optionally with a new part
    /// size for the ranges after it.
    Continue {
        next_range: TransferRange,
        part_size: Option<u64>,
    },

    /// The upload is done; `completion_id` is the provider's id for the new file
    Completed { completion_id: String },
}

/// Shared by every capability trait
pub trait ProviderAdapter: Send + Sync {
    /// Short identifier used in logs, e.g. `"onedrive"`
    fn provider_name(&self) -> &'static str;

    /// Turn an error status and body into a [`TransferError`].
    ///
    /// The default reports the status with the body text as the message.
    fn map_server_error(&self, status: u16, body: &[u8], path: &str) -> TransferError {
        TransferError::ProviderReported {
            status_code: status,
            message: String::from_utf8_lossy(body).trim().to_string(),
            path: path.to_string(),
        }
    }
}

/// Paginated directory listing
pub trait ListingAdapter: ProviderAdapter {
    /// Request for one page of `root_path`. `token` is `None` for the first
    /// page. `Ok(None)` stops the listing.
    fn build_list_request(
        &self,
        root_path: &str,
        token: Option<&str>,
    ) -> Result<Option<HttpRequest>> {
        let _ = (root_path, token);
        Err(TransferError::unsupported("build_list_request"))
    }

    /// Parse a successful (non-error status) listing response.
    fn parse_list_response(
        &self,
        response: &HttpResponse,
        root_path: &str,
    ) -> PageResult<RemoteFile> {
        let _ = (response, root_path);
        PageResult::failed(
            Vec::new(),
            TransferError::unsupported("parse_list_response"),
        )
    }
}

/// Resumable chunked upload
pub trait UploadAdapter: ProviderAdapter {
    fn build_create_session_request(&self, path: &str, total_size: u64) -> Result<HttpRequest> {
        let _ = (path, total_size);
        Err(TransferError::unsupported("build_create_session_request"))
    }

    fn parse_create_session_response(&self, response: &HttpResponse) -> Result<SessionGrant> {
        let _ = response;
        Err(TransferError::unsupported("parse_create_session_response"))
    }

    /// Request carrying exactly the bytes of `range`.
    fn build_part_request(
        &self,
        session: &UploadSessionHandle,
        range: TransferRange,
        total_size: u64,
        data: Bytes,
    ) -> Result<HttpRequest> {
        let _ = (session, range, total_size, data);
        Err(TransferError::unsupported("build_part_request"))
    }

    /// Interpret a part response. Error statuses (>= 400) never reach this
    /// method; intermediate statuses such as 308 do.
    fn parse_part_response(
        &self,
        response: &HttpResponse,
        range: TransferRange,
        total_size: u64,
    ) -> Result<PartOutcome> {
        let _ = (response, range, total_size);
        Err(TransferError::unsupported("parse_part_response"))
    }

    /// Best-effort session teardown after cancellation. `None` when the
    /// provider has no such request.
    fn build_cancel_request(&self, session: &UploadSessionHandle) -> Option<HttpRequest> {
        let _ = session;
        None
    }
}

/// [`PageSource`] over a [`ListingAdapter`] for one root path
pub struct DirectoryListing<'a, A: ListingAdapter + ?Sized> {
    adapter: &'a A,
    root_path: &'a str,
}

impl<'a, A: ListingAdapter + ?Sized> DirectoryListing<'a, A> {
    pub fn new(adapter: &'a A, root_path: &'a str) -> Self {
        Self { adapter, root_path }
    }
}

impl<A: ListingAdapter + ?Sized> PageSource for DirectoryListing<'_, A> {
    type Item = RemoteFile;

    fn build_request(&self, token: Option<&str>) -> Result<Option<HttpRequest>> {
        self.adapter.build_list_request(self.root_path, token)
    }

    fn parse_page(&self, response: &HttpResponse) -> PageResult<RemoteFile> {
        if response.is_error() {
            return PageResult::failed(
                Vec::new(),
                self.adapter
                    .map_server_error(response.status, &response.body, self.root_path),
            );
        }
        self.adapter.parse_list_response(response, self.root_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::http::HttpMethod;

    struct BareAdapter;

    impl ProviderAdapter for BareAdapter {
        fn provider_name(&self) -> &'static str {
            "bare"
        }
    }

    impl ListingAdapter for BareAdapter {}
    impl UploadAdapter for BareAdapter {}

    #[test]
    fn test_defaults_are_unsupported() {
        let adapter = BareAdapter;

        assert!(matches!(
            adapter.build_list_request("/", None),
            Err(TransferError::Unsupported { ref operation }) if operation == "build_list_request"
        ));
        assert!(matches!(
            adapter.build_create_session_request("/a.bin", 10),
            Err(TransferError::Unsupported { .. })
        ));
        assert!(matches!(
            adapter.parse_part_response(
                &HttpResponse::new(200, Bytes::new()),
                TransferRange::new(0, 10),
                10
            ),
            Err(TransferError::Unsupported { .. })
        ));
        assert!(adapter
            .build_cancel_request(&UploadSessionHandle::new("s"))
            .is_none());
    }

    #[test]
    fn test_default_error_mapping() {
        let error = BareAdapter.map_server_error(404, b" not here \n", "/docs");

        match error {
            TransferError::ProviderReported {
                status_code,
                message,
                path,
            } => {
                assert_eq!(status_code, 404);
                assert_eq!(message, "not here");
                assert_eq!(path, "/docs");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_listing_routes_error_status_to_mapper() {
        let listing = DirectoryListing::new(&BareAdapter, "/docs");

        let page = listing.parse_page(&HttpResponse::new(500, "boom"));

        assert!(page.items.is_empty());
        assert!(matches!(
            page.error,
            Some(TransferError::ProviderReported { status_code: 500, .. })
        ));
    }

    #[test]
    fn test_json_body_encoding() {
        let request =
            with_json_body(HttpRequest::new(HttpMethod::Post, "https://x"), &["a.bin"]).unwrap();
        assert_eq!(request.body.as_deref(), Some(&b"[\"a.bin\"]"[..]));

        // JSON object keys must be strings
        let mut unencodable = std::collections::HashMap::new();
        unencodable.insert((1u8, 2u8), 3u8);
        let error = with_json_body(HttpRequest::new(HttpMethod::Post, "https://x"), &unencodable)
            .unwrap_err();

        assert_eq!(error.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_session_handle_debug_is_redacted() {
        let handle = UploadSessionHandle::new("https://upload.example.com/secret");

        assert!(!format!("{:?}", handle).contains("secret"));
        assert_eq!(handle.as_str(), "https://upload.example.com/secret");
    }
}
