//! Shared fixtures: a scripted HTTP client and a small JSON provider adapter.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::RemoteFile;
use bytes::Bytes;
use core_transfer::{
    ListingAdapter, PageResult, PartOutcome, ProviderAdapter, SessionGrant, TransferError,
    TransferRange, UploadAdapter, UploadObserver, UploadProgress, UploadSessionHandle,
    UploadSummary,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const SESSION_URL: &str = "https://upload.test/session/1";

/// One scripted reaction to the next request
pub enum Step {
    Respond(HttpResponse),
    Fail(String),
    /// Never answers; only cancellation gets the caller out
    Hang,
}

pub fn json_response(status: u16, body: Value) -> Step {
    Step::Respond(HttpResponse::new(status, body.to_string()))
}

pub fn empty_response(status: u16) -> Step {
    Step::Respond(HttpResponse::new(status, Bytes::new()))
}

/// Answers requests from a fixed script and records every request it sees
#[derive(Default)]
pub struct ScriptedHttpClient {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
    replayable_sends: AtomicUsize,
}

impl ScriptedHttpClient {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            replayable_sends: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// How many requests came in through `execute_with_retry`
    pub fn replayable_sends(&self) -> usize {
        self.replayable_sends.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` requests were recorded
    pub async fn wait_for_requests(&self, count: usize) {
        for _ in 0..500 {
            if self.request_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!(
            "expected {} requests, saw {}",
            count,
            self.request_count()
        );
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(BridgeError::OperationFailed(message)),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(BridgeError::OperationFailed("script exhausted".to_string())),
        }
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        _policy: RetryPolicy,
    ) -> BridgeResult<HttpResponse> {
        self.replayable_sends.fetch_add(1, Ordering::SeqCst);
        self.execute(request).await
    }
}

/// Provider speaking a tiny JSON dialect:
///
/// - list pages: `{"items": [{"id", "name"}], "next": "token" | null}`
/// - session: `{"session": url, "part_size": n}`
/// - part: `201 {"id"}` completes, `202 {"next": [lo, hi], "part_size"?}`
///   dictates the next range, `202` with an empty body accepts
pub struct JsonAdapter;

impl ProviderAdapter for JsonAdapter {
    fn provider_name(&self) -> &'static str {
        "json-test"
    }
}

impl ListingAdapter for JsonAdapter {
    fn build_list_request(
        &self,
        root_path: &str,
        token: Option<&str>,
    ) -> core_transfer::Result<Option<HttpRequest>> {
        let mut url = format!("https://api.test/list{}", root_path);
        if let Some(token) = token {
            url.push_str("?token=");
            url.push_str(token);
        }
        Ok(Some(HttpRequest::new(HttpMethod::Get, url)))
    }

    fn parse_list_response(&self, response: &HttpResponse, _root_path: &str) -> PageResult<RemoteFile> {
        let body: Value = match serde_json::from_slice(&response.body) {
            Ok(body) => body,
            Err(e) => return PageResult::failed(Vec::new(), TransferError::bad_response(e.to_string())),
        };

        let items = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        RemoteFile::new(
                            item["id"].as_str().unwrap_or_default(),
                            item["name"].as_str().unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        PageResult::page(items, body["next"].as_str().map(String::from))
    }
}

impl UploadAdapter for JsonAdapter {
    fn build_create_session_request(
        &self,
        path: &str,
        total_size: u64,
    ) -> core_transfer::Result<HttpRequest> {
        HttpRequest::new(HttpMethod::Post, "https://api.test/sessions")
            .json(&json!({ "path": path, "size": total_size }))
            .map_err(TransferError::from)
    }

    fn parse_create_session_response(
        &self,
        response: &HttpResponse,
    ) -> core_transfer::Result<SessionGrant> {
        let body: Value = serde_json::from_slice(&response.body)
            .map_err(|e| TransferError::bad_response(e.to_string()))?;
        let session = body["session"]
            .as_str()
            .ok_or_else(|| TransferError::bad_response("missing session"))?;
        let part_size = body["part_size"]
            .as_u64()
            .ok_or_else(|| TransferError::bad_response("missing part_size"))?;

        Ok(SessionGrant {
            session: UploadSessionHandle::new(session),
            part_size,
        })
    }

    fn build_part_request(
        &self,
        session: &UploadSessionHandle,
        range: TransferRange,
        total_size: u64,
        data: Bytes,
    ) -> core_transfer::Result<HttpRequest> {
        Ok(HttpRequest::new(HttpMethod::Put, session.as_str())
            .header("Content-Range", range.content_range(total_size))
            .body(data))
    }

    fn parse_part_response(
        &self,
        response: &HttpResponse,
        _range: TransferRange,
        _total_size: u64,
    ) -> core_transfer::Result<PartOutcome> {
        if response.body.is_empty() {
            return Ok(PartOutcome::Accepted);
        }
        let body: Value = serde_json::from_slice(&response.body)
            .map_err(|e| TransferError::bad_response(e.to_string()))?;

        if let Some(id) = body["id"].as_str() {
            return Ok(PartOutcome::Completed {
                completion_id: id.to_string(),
            });
        }
        match body["next"].as_array().map(Vec::as_slice) {
            Some([lower, upper]) => Ok(PartOutcome::Continue {
                next_range: TransferRange::new(
                    lower.as_u64().unwrap_or_default(),
                    upper.as_u64().unwrap_or_default(),
                ),
                part_size: body["part_size"].as_u64(),
            }),
            _ => Ok(PartOutcome::Accepted),
        }
    }

    fn build_cancel_request(&self, session: &UploadSessionHandle) -> Option<HttpRequest> {
        Some(HttpRequest::new(HttpMethod::Delete, session.as_str()))
    }
}

/// Records every notification as a short string
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<UploadProgress>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with("complete") || e.starts_with("failure"))
            .count()
    }
}

impl UploadObserver for RecordingObserver {
    fn on_progress(&self, progress: &UploadProgress) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn on_complete(&self, summary: &UploadSummary) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete:{}", summary.completion_id));
    }

    fn on_failure(&self, error: &TransferError) {
        self.events
            .lock()
            .unwrap()
            .push(format!("failure:{:?}", error.kind()));
    }
}

pub fn session_created(part_size: u64) -> Step {
    json_response(200, json!({ "session": SESSION_URL, "part_size": part_size }))
}

pub fn content_ranges(requests: &[HttpRequest]) -> Vec<String> {
    requests
        .iter()
        .filter(|r| r.method == HttpMethod::Put)
        .filter_map(|r| r.header_value("Content-Range").map(String::from))
        .collect()
}
