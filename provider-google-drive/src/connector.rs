//! Drive v3 adapter: request builders and response parsers
//!
//! Implements the listing and upload capabilities for Google Drive API v3.
//!
//! Drive addresses everything by id, not by path:
//!
//! - a listing root is a folder id; `""` or `"/"` means the drive root
//! - an upload path is `"{parent_folder_id}/{file_name}"`, or a bare file
//!   name for the drive root

use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::RemoteFile;
use bytes::Bytes;
use core_runtime::config::TransferConfig;
use core_transfer::{
    with_json_body, ListingAdapter, PageResult, PartOutcome, ProviderAdapter, SessionGrant,
    TransferError, TransferRange, UploadAdapter, UploadSessionHandle,
};
use std::collections::HashMap;
use tracing::debug;

use crate::error::GoogleDriveError;
use crate::types::{CreatedFile, DriveFile, FileList, NewFileMetadata};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload endpoint base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// `files.list` rejects larger `pageSize` values
const MAX_PAGE_SIZE: u32 = 1000;

/// Resumable upload parts must be multiples of 256 KiB
pub const UPLOAD_GRANULARITY: u64 = 256 * 1024;

/// Google's "Resume Incomplete" status
const RESUME_INCOMPLETE: u16 = 308;

/// Google Drive API connector
///
/// Builds requests and parses responses for the transfer engines; it never
/// sends anything itself.
///
/// # Example
///
/// ```ignore
/// use core_transfer::CloudClient;
/// use provider_google_drive::GoogleDriveConnector;
///
/// let connector = GoogleDriveConnector::new(access_token, config.transfer.clone());
/// let client = CloudClient::from_config(&config, connector);
/// let files = client.list_all("root").await?;
/// ```
pub struct GoogleDriveConnector {
    /// OAuth 2.0 access token
    access_token: String,
    transfer: TransferConfig,
    api_base: String,
    upload_base: String,
}

impl GoogleDriveConnector {
    /// Connector for one account
    ///
    /// # Arguments
    ///
    /// * `access_token` - OAuth 2.0 access token with a `drive` or `drive.file` scope
    /// * `transfer` - page size, part size and request timeout settings
    pub fn new(access_token: impl Into<String>, transfer: TransferConfig) -> Self {
        Self {
            access_token: access_token.into(),
            transfer,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Point the connector at different endpoints (proxies, test servers)
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Part size requested for uploads, aligned to 256 KiB
    pub fn part_size(&self) -> u64 {
        self.transfer.part_size_aligned(UPLOAD_GRANULARITY)
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        request
            .bearer_token(&self.access_token)
            .timeout(self.transfer.request_timeout)
    }

    fn folder_id(root_path: &str) -> &str {
        match root_path.trim_matches('/') {
            "" => "root",
            id => id,
        }
    }

    /// Split an upload path into parent folder id and file name
    fn split_upload_path(path: &str) -> (Option<&str>, &str) {
        match path.trim_start_matches('/').rsplit_once('/') {
            Some((parent, name)) if !parent.is_empty() => (Some(parent), name),
            Some((_, name)) => (None, name),
            None => (None, path.trim_start_matches('/')),
        }
    }

    /// Map a Drive resource onto the shared listing shape
    fn convert_file(&self, drive_file: DriveFile) -> RemoteFile {
        let mut metadata = HashMap::new();
        metadata.insert("trashed".to_string(), drive_file.trashed.to_string());

        RemoteFile {
            is_folder: drive_file.is_folder(),
            id: drive_file.id,
            name: drive_file.name,
            path: None,
            mime_type: Some(drive_file.mime_type),
            size: drive_file.size,
            created_at: drive_file.created_time.map(|t| t.timestamp()),
            modified_at: drive_file.modified_time.map(|t| t.timestamp()),
            parent_ids: drive_file.parents,
            content_hash: drive_file.md5_checksum,
            metadata,
        }
    }

    /// `Range: bytes=0-N` from a 308 response, as the exclusive end `N + 1`.
    /// No header means the server holds nothing yet.
    fn persisted_upto(response: &HttpResponse) -> Result<u64, TransferError> {
        let Some(value) = response.header("Range") else {
            return Ok(0);
        };

        value
            .trim()
            .strip_prefix("bytes=")
            .and_then(|range| range.split_once('-'))
            .and_then(|(_, last)| last.trim().parse::<u64>().ok())
            .and_then(|last| last.checked_add(1))
            .ok_or_else(|| {
                GoogleDriveError::ParseError(format!("malformed Range header: {value}")).into()
            })
    }
}

impl ProviderAdapter for GoogleDriveConnector {
    fn provider_name(&self) -> &'static str {
        "google_drive"
    }

    fn map_server_error(&self, status: u16, body: &[u8], path: &str) -> TransferError {
        GoogleDriveError::from_status(status, body).into_transfer_error(path)
    }
}

impl ListingAdapter for GoogleDriveConnector {
    fn build_list_request(
        &self,
        root_path: &str,
        token: Option<&str>,
    ) -> core_transfer::Result<Option<HttpRequest>> {
        let query = format!(
            "'{}' in parents and trashed=false",
            Self::folder_id(root_path).replace('\'', "\\'")
        );

        let mut url = format!(
            "{}/files?q={}&pageSize={}&fields=nextPageToken,incompleteSearch,files({})",
            self.api_base,
            urlencoding::encode(&query),
            self.transfer.page_size.min(MAX_PAGE_SIZE),
            DriveFile::FIELDS
        );

        if let Some(page_token) = token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(page_token)));
        }

        Ok(Some(self.authorized(
            HttpRequest::new(HttpMethod::Get, url).header("Accept", "application/json"),
        )))
    }

    fn parse_list_response(&self, response: &HttpResponse, _root_path: &str) -> PageResult<RemoteFile> {
        let list_response: FileList = match serde_json::from_slice(&response.body) {
            Ok(list) => list,
            Err(e) => {
                return PageResult::failed(
                    Vec::new(),
                    GoogleDriveError::ParseError(format!("files.list body: {}", e))
                        .into(),
                )
            }
        };

        if list_response.incomplete_search {
            debug!("Drive reported an incomplete search");
        }

        let files = list_response
            .files
            .into_iter()
            .map(|f| self.convert_file(f))
            .collect();

        PageResult::page(files, list_response.next_page_token)
    }
}

impl UploadAdapter for GoogleDriveConnector {
    fn build_create_session_request(
        &self,
        path: &str,
        total_size: u64,
    ) -> core_transfer::Result<HttpRequest> {
        let (parent, name) = Self::split_upload_path(path);
        if name.is_empty() {
            return Err(TransferError::InvalidArgument(format!(
                "upload path has no file name: {path}"
            )));
        }

        let metadata = NewFileMetadata {
            name,
            parents: parent.map(|p| [p]),
        };

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files?uploadType=resumable&fields=id", self.upload_base),
        )
        .header("X-Upload-Content-Length", total_size.to_string())
        .header("X-Upload-Content-Type", "application/octet-stream");
        let request = with_json_body(request, &metadata)?;

        Ok(self.authorized(request))
    }

    fn parse_create_session_response(
        &self,
        response: &HttpResponse,
    ) -> core_transfer::Result<SessionGrant> {
        let location = response
            .header("Location")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                TransferError::from(GoogleDriveError::ParseError(
                    "resumable session response has no Location header".to_string(),
                ))
            })?;

        Ok(SessionGrant {
            session: UploadSessionHandle::new(location),
            part_size: self.part_size(),
        })
    }

    fn build_part_request(
        &self,
        session: &UploadSessionHandle,
        range: TransferRange,
        total_size: u64,
        data: Bytes,
    ) -> core_transfer::Result<HttpRequest> {
        Ok(self.authorized(
            HttpRequest::new(HttpMethod::Put, session.as_str())
                .header("Content-Length", range.len().to_string())
                .header("Content-Range", range.content_range(total_size))
                .body(data),
        ))
    }

    fn parse_part_response(
        &self,
        response: &HttpResponse,
        range: TransferRange,
        total_size: u64,
    ) -> core_transfer::Result<PartOutcome> {
        match response.status {
            200 | 201 => {
                let file: CreatedFile = response.json().map_err(|e| {
                    GoogleDriveError::ParseError(format!("Failed to parse uploaded file: {}", e))
                })?;
                Ok(PartOutcome::Completed {
                    completion_id: file.id,
                })
            }
            RESUME_INCOMPLETE => {
                let persisted = Self::persisted_upto(response)?;
                if persisted == range.upper_bound {
                    return Ok(PartOutcome::Accepted);
                }
                let upper = persisted.saturating_add(self.part_size()).min(total_size);
                Ok(PartOutcome::Continue {
                    next_range: TransferRange::new(persisted, upper),
                    part_size: None,
                })
            }
            status => Err(GoogleDriveError::ParseError(format!(
                "unexpected status {status} for upload part"
            ))
            .into()),
        }
    }

    fn build_cancel_request(&self, session: &UploadSessionHandle) -> Option<HttpRequest> {
        Some(self.authorized(HttpRequest::new(HttpMethod::Delete, session.as_str())))
    }
}
