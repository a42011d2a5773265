//! Microsoft Graph connector for OneDrive
//!
//! Paths are drive-root relative (`/Documents/report.pdf`) and addressed with
//! Graph's `root:/{path}:` syntax.

use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::RemoteFile;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::config::TransferConfig;
use core_transfer::{
    with_json_body, ListingAdapter, PageResult, PartOutcome, ProviderAdapter, SessionGrant,
    TransferError, TransferRange, UploadAdapter, UploadSessionHandle,
};
use std::collections::HashMap;
use tracing::debug;

use crate::error::OneDriveError;
use crate::types::{
    CreateUploadSessionRequest, DriveItem, DriveItemPage, UploadItemProperties, UploadSession,
};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Graph caps `$top` for children listings
const MAX_PAGE_SIZE: u32 = 999;

/// Upload parts must be multiples of 320 KiB
pub const UPLOAD_GRANULARITY: u64 = 320 * 1024;

/// OneDrive (personal and business) through Microsoft Graph
pub struct OneDriveConnector {
    access_token: String,
    transfer: TransferConfig,
    api_base: String,
    conflict_behavior: String,
}

impl OneDriveConnector {
    pub fn new(access_token: impl Into<String>, transfer: TransferConfig) -> Self {
        Self {
            access_token: access_token.into(),
            transfer,
            api_base: GRAPH_API_BASE.to_string(),
            conflict_behavior: "replace".to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// What Graph does when the upload target exists: `replace`, `rename`
    /// or `fail`.
    pub fn with_conflict_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.conflict_behavior = behavior.into();
        self
    }

    /// Part size requested for uploads, aligned to 320 KiB
    pub fn part_size(&self) -> u64 {
        self.transfer.part_size_aligned(UPLOAD_GRANULARITY)
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        request
            .bearer_token(&self.access_token)
            .timeout(self.transfer.request_timeout)
    }

    /// `…/me/drive/root` for `/`, `…/me/drive/root:/a/b%20c:` otherwise
    fn item_url(&self, path: &str) -> String {
        let encoded: Vec<_> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();

        if encoded.is_empty() {
            format!("{}/me/drive/root", self.api_base)
        } else {
            format!("{}/me/drive/root:/{}:", self.api_base, encoded.join("/"))
        }
    }

    fn parse_timestamp(value: Option<&str>) -> Option<i64> {
        value
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    fn convert_item(item: DriveItem, root_path: &str) -> RemoteFile {
        let parent = root_path.trim_matches('/');
        let path = if parent.is_empty() {
            format!("/{}", item.name)
        } else {
            format!("/{}/{}", parent, item.name)
        };

        let mut metadata = HashMap::new();
        if let Some(e_tag) = item.e_tag {
            metadata.insert("etag".to_string(), e_tag);
        }
        if let Some(folder) = &item.folder {
            metadata.insert("child_count".to_string(), folder.child_count.to_string());
        }

        let (mime_type, content_hash) = match item.file {
            Some(file) => {
                let hash = file
                    .hashes
                    .and_then(|h| h.quick_xor_hash.or(h.sha1_hash));
                (file.mime_type, hash)
            }
            None => (None, None),
        };

        RemoteFile {
            id: item.id,
            name: item.name,
            path: Some(path),
            mime_type,
            size: item.size,
            created_at: Self::parse_timestamp(item.created_date_time.as_deref()),
            modified_at: Self::parse_timestamp(item.last_modified_date_time.as_deref()),
            is_folder: item.folder.is_some(),
            parent_ids: item
                .parent_reference
                .and_then(|r| r.id)
                .into_iter()
                .collect(),
            content_hash,
            metadata,
        }
    }

    /// Parse a `nextExpectedRanges` entry: `"26-"` or `"26-49"` (inclusive).
    fn parse_expected_range(value: &str, total_size: u64) -> Option<(u64, u64)> {
        let (first, last) = value.split_once('-')?;
        let lower = first.trim().parse::<u64>().ok()?;
        let upper = match last.trim() {
            "" => total_size,
            last => last.parse::<u64>().ok()?.saturating_add(1),
        };
        Some((lower, upper))
    }
}

impl ProviderAdapter for OneDriveConnector {
    fn provider_name(&self) -> &'static str {
        "onedrive"
    }

    fn map_server_error(&self, status: u16, body: &[u8], path: &str) -> TransferError {
        OneDriveError::from_status(status, body).into_transfer_error(path)
    }
}

impl ListingAdapter for OneDriveConnector {
    fn build_list_request(
        &self,
        root_path: &str,
        token: Option<&str>,
    ) -> core_transfer::Result<Option<HttpRequest>> {
        // The next token is the complete @odata.nextLink URL
        let url = match token {
            Some(next_link) => next_link.to_string(),
            None => format!(
                "{}/children?$top={}",
                self.item_url(root_path),
                self.transfer.page_size.min(MAX_PAGE_SIZE)
            ),
        };

        Ok(Some(self.authorized(
            HttpRequest::new(HttpMethod::Get, url).header("Accept", "application/json"),
        )))
    }

    fn parse_list_response(&self, response: &HttpResponse, root_path: &str) -> PageResult<RemoteFile> {
        let page: DriveItemPage = match response.json() {
            Ok(page) => page,
            Err(e) => {
                return PageResult::failed(
                    Vec::new(),
                    OneDriveError::InvalidResponse(format!("children page: {}", e)).into(),
                )
            }
        };

        let items = page
            .value
            .into_iter()
            .map(|item| Self::convert_item(item, root_path))
            .collect();

        PageResult::page(items, page.next_link)
    }
}

impl UploadAdapter for OneDriveConnector {
    fn build_create_session_request(
        &self,
        path: &str,
        total_size: u64,
    ) -> core_transfer::Result<HttpRequest> {
        if path.trim_matches('/').is_empty() {
            return Err(TransferError::InvalidArgument(format!(
                "upload path has no file name: {path:?}"
            )));
        }
        debug!(total_size, "Creating OneDrive upload session");

        let body = CreateUploadSessionRequest {
            item: UploadItemProperties {
                conflict_behavior: self.conflict_behavior.clone(),
            },
        };
        let request = with_json_body(
            HttpRequest::new(
                HttpMethod::Post,
                format!("{}/createUploadSession", self.item_url(path)),
            ),
            &body,
        )?;

        Ok(self.authorized(request))
    }

    fn parse_create_session_response(
        &self,
        response: &HttpResponse,
    ) -> core_transfer::Result<SessionGrant> {
        let session: UploadSession = response
            .json()
            .map_err(|e| OneDriveError::InvalidResponse(format!("upload session: {}", e)))?;

        let upload_url = session
            .upload_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| OneDriveError::InvalidResponse("upload session has no uploadUrl".to_string()))?;

        Ok(SessionGrant {
            session: UploadSessionHandle::new(upload_url),
            part_size: self.part_size(),
        })
    }

    /// The upload URL is pre-authenticated; Graph rejects requests to it that
    /// also carry a bearer token.
    fn build_part_request(
        &self,
        session: &UploadSessionHandle,
        range: TransferRange,
        total_size: u64,
        data: Bytes,
    ) -> core_transfer::Result<HttpRequest> {
        Ok(HttpRequest::new(HttpMethod::Put, session.as_str())
            .header("Content-Length", range.len().to_string())
            .header("Content-Range", range.content_range(total_size))
            .body(data)
            .timeout(self.transfer.request_timeout))
    }

    fn parse_part_response(
        &self,
        response: &HttpResponse,
        range: TransferRange,
        total_size: u64,
    ) -> core_transfer::Result<PartOutcome> {
        match response.status {
            200 | 201 => {
                let item: DriveItem = response
                    .json()
                    .map_err(|e| OneDriveError::InvalidResponse(format!("uploaded item: {}", e)))?;
                Ok(PartOutcome::Completed {
                    completion_id: item.id,
                })
            }
            202 => {
                let session: UploadSession = response
                    .json()
                    .map_err(|e| OneDriveError::InvalidResponse(format!("upload session: {}", e)))?;

                let Some(first) = session.next_expected_ranges.first() else {
                    return Ok(PartOutcome::Accepted);
                };
                let (lower, upper) = Self::parse_expected_range(first, total_size).ok_or_else(|| {
                    OneDriveError::InvalidResponse(format!("malformed nextExpectedRanges entry {first:?}"))
                })?;

                if lower == range.upper_bound && upper >= total_size {
                    return Ok(PartOutcome::Accepted);
                }

                let upper = upper.min(lower.saturating_add(self.part_size())).min(total_size);
                Ok(PartOutcome::Continue {
                    next_range: TransferRange::new(lower, upper),
                    part_size: None,
                })
            }
            status => Err(OneDriveError::InvalidResponse(format!(
                "unexpected status {status} for upload part"
            ))
            .into()),
        }
    }

    fn build_cancel_request(&self, session: &UploadSessionHandle) -> Option<HttpRequest> {
        Some(
            HttpRequest::new(HttpMethod::Delete, session.as_str())
                .timeout(self.transfer.request_timeout),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpClient;
    use core_transfer::{CloudClient, UploadObserver, UploadOptions};
    use mockall::{mock, Sequence};
    use std::sync::{Arc, Mutex};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn connector() -> OneDriveConnector {
        OneDriveConnector::new(
            "graph_token",
            TransferConfig::default().with_default_part_size(UPLOAD_GRANULARITY),
        )
    }

    #[test]
    fn test_item_url_encodes_segments() {
        let adapter = connector();

        assert_eq!(adapter.item_url("/"), "https://graph.microsoft.com/v1.0/me/drive/root");
        assert_eq!(
            adapter.item_url("/My Docs/q#1.txt"),
            "https://graph.microsoft.com/v1.0/me/drive/root:/My%20Docs/q%231.txt:"
        );
    }

    #[test]
    fn test_list_request_first_page_and_next_link() {
        let adapter = connector();

        let first = adapter.build_list_request("/Music", None).unwrap().unwrap();
        assert_eq!(
            first.url,
            "https://graph.microsoft.com/v1.0/me/drive/root:/Music:/children?$top=200"
        );
        assert_eq!(first.header_value("Authorization"), Some("Bearer graph_token"));

        let next_link = "https://graph.microsoft.com/v1.0/me/drive/items/X/children?$skiptoken=abc";
        let next = adapter
            .build_list_request("/Music", Some(next_link))
            .unwrap()
            .unwrap();
        assert_eq!(next.url, next_link);
    }

    #[test]
    fn test_parse_children() {
        let body = r#"{
            "value": [
                {
                    "id": "A1",
                    "name": "song.flac",
                    "size": 2048,
                    "lastModifiedDateTime": "2024-01-01T00:00:00Z",
                    "file": { "mimeType": "audio/flac", "hashes": { "quickXorHash": "qx" } },
                    "parentReference": { "id": "P1", "path": "/drive/root:/Music" }
                },
                { "id": "B2", "name": "Live", "folder": { "childCount": 7 } }
            ]
        }"#;

        let page = connector().parse_list_response(&HttpResponse::new(200, body), "/Music/");

        assert!(page.is_complete());
        assert_eq!(page.items.len(), 2);
        let file = &page.items[0];
        assert_eq!(file.path.as_deref(), Some("/Music/song.flac"));
        assert_eq!(file.size, Some(2048));
        assert_eq!(file.content_hash.as_deref(), Some("qx"));
        assert_eq!(file.modified_at, Some(1_704_067_200));
        assert_eq!(file.parent_ids, vec!["P1"]);
        let folder = &page.items[1];
        assert!(folder.is_folder);
        assert_eq!(folder.metadata.get("child_count"), Some(&"7".to_string()));
    }

    #[test]
    fn test_parse_children_garbage() {
        let page = connector().parse_list_response(&HttpResponse::new(200, "<html/>"), "/");

        assert!(page.next_token.is_none());
        assert_eq!(
            page.error.map(|e| e.kind()),
            Some(core_transfer::ErrorKind::BadServerResponse)
        );
    }

    #[test]
    fn test_create_session() {
        let adapter = connector();

        let request = adapter.build_create_session_request("/Backups/a.bin", 10).unwrap();
        assert_eq!(
            request.url,
            "https://graph.microsoft.com/v1.0/me/drive/root:/Backups/a.bin:/createUploadSession"
        );
        assert!(adapter.build_create_session_request("/", 10).is_err());

        let grant = adapter
            .parse_create_session_response(&HttpResponse::new(
                200,
                r#"{"uploadUrl": "https://sn3302.up.1drv.com/up/fe6987415ace7X4e1eF866337", "nextExpectedRanges": ["0-"]}"#,
            ))
            .unwrap();
        assert_eq!(grant.part_size, UPLOAD_GRANULARITY);

        let err = adapter
            .parse_create_session_response(&HttpResponse::new(200, r#"{"nextExpectedRanges": []}"#))
            .unwrap_err();
        assert_eq!(err.kind(), core_transfer::ErrorKind::BadServerResponse);
    }

    #[test]
    fn test_part_request_has_no_bearer_token() {
        let request = connector()
            .build_part_request(
                &UploadSessionHandle::new("https://up.test/s"),
                TransferRange::new(0, 26),
                128,
                Bytes::from(vec![0u8; 26]),
            )
            .unwrap();

        assert!(request.header_value("Authorization").is_none());
        assert_eq!(request.header_value("Content-Range"), Some("bytes 0-25/128"));
        assert_eq!(request.header_value("Content-Length"), Some("26"));
    }

    #[test]
    fn test_expected_ranges() {
        let adapter = connector();
        let range = TransferRange::new(0, 26);

        let accepted = adapter
            .parse_part_response(&HttpResponse::new(202, r#"{"nextExpectedRanges": ["26-"]}"#), range, 128)
            .unwrap();
        assert_eq!(accepted, PartOutcome::Accepted);

        let rewind = adapter
            .parse_part_response(&HttpResponse::new(202, r#"{"nextExpectedRanges": ["12-"]}"#), range, 128)
            .unwrap();
        assert_eq!(
            rewind,
            PartOutcome::Continue {
                next_range: TransferRange::new(12, 128),
                part_size: None,
            }
        );

        let bounded = adapter
            .parse_part_response(
                &HttpResponse::new(202, r#"{"nextExpectedRanges": ["26-49", "80-"]}"#),
                range,
                128,
            )
            .unwrap();
        assert_eq!(
            bounded,
            PartOutcome::Continue {
                next_range: TransferRange::new(26, 50),
                part_size: None,
            }
        );

        assert!(adapter
            .parse_part_response(&HttpResponse::new(202, r#"{"nextExpectedRanges": ["x-"]}"#), range, 128)
            .is_err());
    }

    #[test]
    fn test_parse_expected_range() {
        assert_eq!(OneDriveConnector::parse_expected_range("26-", 100), Some((26, 100)));
        assert_eq!(OneDriveConnector::parse_expected_range("26-49", 100), Some((26, 50)));
        assert_eq!(OneDriveConnector::parse_expected_range("26", 100), None);
    }

    #[derive(Default)]
    struct Terminal(Mutex<Vec<String>>);

    impl UploadObserver for Terminal {
        fn on_complete(&self, summary: &core_transfer::UploadSummary) {
            self.0.lock().unwrap().push(summary.completion_id.clone());
        }

        fn on_failure(&self, error: &TransferError) {
            self.0.lock().unwrap().push(error.to_string());
        }
    }

    #[tokio::test]
    async fn test_upload_with_server_rewind() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        let total = UPLOAD_GRANULARITY * 2;

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert!(req.url.ends_with("root:/Backups/db.bak:/createUploadSession"));
                Ok(HttpResponse::new(200, r#"{"uploadUrl": "https://up.test/session"}"#))
            });
        // Server only kept the first 1000 bytes of part one
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |req| {
                assert_eq!(
                    req.header_value("Content-Range").unwrap(),
                    format!("bytes 0-{}/{}", UPLOAD_GRANULARITY - 1, total)
                );
                Ok(HttpResponse::new(202, r#"{"nextExpectedRanges": ["1000-"]}"#))
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |req| {
                assert_eq!(
                    req.header_value("Content-Range").unwrap(),
                    format!("bytes 1000-{}/{}", 1000 + UPLOAD_GRANULARITY - 1, total)
                );
                Ok(HttpResponse::new(202, format!(
                    r#"{{"nextExpectedRanges": ["{}-"]}}"#,
                    1000 + UPLOAD_GRANULARITY
                )))
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |req| {
                assert_eq!(
                    req.header_value("Content-Range").unwrap(),
                    format!("bytes {}-{}/{}", 1000 + UPLOAD_GRANULARITY, total - 1, total)
                );
                Ok(HttpResponse::new(201, r#"{"id": "01NEWITEM", "name": "db.bak"}"#))
            });

        let observer = Arc::new(Terminal::default());
        let client = CloudClient::new(Arc::new(mock_http), connector());
        let summary = client
            .upload_bytes(
                "/Backups/db.bak",
                vec![1u8; total as usize],
                UploadOptions::default().with_observer(observer.clone()),
            )
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(summary.completion_id, "01NEWITEM");
        assert_eq!(summary.parts_sent, 3);
        assert_eq!(*observer.0.lock().unwrap(), vec!["01NEWITEM"]);
    }

    #[tokio::test]
    async fn test_list_all_maps_graph_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                401,
                r#"{"error": {"code": "InvalidAuthenticationToken", "message": "Access token has expired."}}"#,
            ))
        });

        let client = CloudClient::new(Arc::new(mock_http), connector());
        let err = client.list_all("/").await.unwrap_err();

        match err {
            TransferError::ProviderReported {
                status_code,
                message,
                path,
            } => {
                assert_eq!(status_code, 401);
                assert!(message.contains("InvalidAuthenticationToken"));
                assert_eq!(path, "/");
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
