//! # Chunked Upload Session
//!
//! Drives one resumable upload from session creation to completion.
//!
//! ## State Machine
//!
//! ```text
//! Idle → SessionCreated → PartInFlight ⟲ → Completed
//!   ↓          ↓               ↓
//!   └──────────┴───────────────┴──→ Failed | Cancelled
//! ```
//!
//! Parts are sent strictly one after another. After each part the provider
//! adapter says whether the server accepted it, dictated a different next
//! range, or finished the upload. A server-dictated range always wins over
//! the locally computed one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let handle = ChunkedUploadSession::start(
//!     http_client,
//!     adapter,
//!     "/Backups/photos.zip",
//!     Arc::new(FileDataProvider::new("photos.zip")),
//!     total_size,
//!     UploadOptions::default(),
//! )?;
//!
//! let summary = handle.wait().await?;
//! println!("uploaded as {}", summary.completion_id);
//! ```

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::logging::strip_path;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapter::{PartOutcome, UploadAdapter, UploadSessionHandle};
use crate::data_provider::DataProvider;
use crate::error::{Result, TransferError};
use crate::range::{TransferRange, UploadTarget};
use crate::registry::UploadRegistry;

/// Unique identifier for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Create a new random upload ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UploadId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle status of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Started, session not created yet
    Idle,
    /// Session exists, no part sent yet
    SessionCreated,
    /// A part is being read or sent
    PartInFlight,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }
}

/// Point-in-time view of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub id: UploadId,
    pub status: UploadStatus,
    /// Bytes the server is known to hold
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub current_range: Option<TransferRange>,
}

impl UploadProgress {
    /// Fraction uploaded, between 0.0 and 1.0
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.uploaded_bytes as f64 / self.total_bytes as f64
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub id: UploadId,
    /// Provider id of the uploaded file
    pub completion_id: String,
    pub total_bytes: u64,
    pub parts_sent: u32,
}

/// Receives upload notifications.
///
/// Exactly one of `on_complete` / `on_failure` is called per upload, from the
/// upload task. Cancellation arrives as `on_failure(TransferError::Cancelled)`.
pub trait UploadObserver: Send + Sync {
    fn on_progress(&self, _progress: &UploadProgress) {}

    fn on_complete(&self, _summary: &UploadSummary) {}

    fn on_failure(&self, _error: &TransferError) {}
}

/// Per-upload options
#[derive(Default, Clone)]
pub struct UploadOptions {
    observer: Option<Arc<dyn UploadObserver>>,
    registry: Option<Arc<UploadRegistry>>,
}

impl UploadOptions {
    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Track the upload in `registry` until it reaches a terminal state.
    pub fn with_registry(mut self, registry: Arc<UploadRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("observer", &self.observer.is_some())
            .field("registry", &self.registry.is_some())
            .finish()
    }
}

/// Mutable state owned by the upload task
#[derive(Debug)]
pub struct UploadState {
    pub status: UploadStatus,
    /// Set once the session exists
    pub target: Option<UploadTarget>,
    pub uploaded_so_far: u64,
    pub current_range: Option<TransferRange>,
    pub parts_sent: u32,
}

impl UploadState {
    fn new() -> Self {
        Self {
            status: UploadStatus::Idle,
            target: None,
            uploaded_so_far: 0,
            current_range: None,
            parts_sent: 0,
        }
    }
}

/// One resumable upload. Lives inside its own tokio task; callers talk to it
/// through the [`UploadHandle`] returned by [`start`](Self::start).
pub struct ChunkedUploadSession {
    id: UploadId,
    path: String,
    total_size: u64,
    http_client: Arc<dyn HttpClient>,
    adapter: Arc<dyn UploadAdapter>,
    data_provider: Arc<dyn DataProvider>,
    observer: Option<Arc<dyn UploadObserver>>,
    registry: Option<Arc<UploadRegistry>>,
    cancel_token: CancellationToken,
    progress_tx: watch::Sender<UploadProgress>,
    result_tx: Option<oneshot::Sender<Result<UploadSummary>>>,
    state: UploadState,
}

impl ChunkedUploadSession {
    /// Validate the arguments and spawn the upload on the current tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `total_size` is zero. No request is sent and no
    /// observer is notified in that case.
    pub fn start(
        http_client: Arc<dyn HttpClient>,
        adapter: Arc<dyn UploadAdapter>,
        path: impl Into<String>,
        data_provider: Arc<dyn DataProvider>,
        total_size: u64,
        options: UploadOptions,
    ) -> Result<UploadHandle> {
        if total_size == 0 {
            return Err(TransferError::InvalidArgument(
                "total_size must be greater than 0".to_string(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            TransferError::Internal("uploads must be started inside a tokio runtime".to_string())
        })?;

        let id = UploadId::new();
        let cancel_token = CancellationToken::new();
        let (progress_tx, progress_rx) = watch::channel(UploadProgress {
            id,
            status: UploadStatus::Idle,
            uploaded_bytes: 0,
            total_bytes: total_size,
            current_range: None,
        });
        let (result_tx, result_rx) = oneshot::channel();

        if let Some(registry) = &options.registry {
            registry.insert(id, cancel_token.clone());
        }

        let session = ChunkedUploadSession {
            id,
            path: path.into(),
            total_size,
            http_client,
            adapter,
            data_provider,
            observer: options.observer,
            registry: options.registry,
            cancel_token: cancel_token.clone(),
            progress_tx,
            result_tx: Some(result_tx),
            state: UploadState::new(),
        };

        runtime.spawn(session.run());

        Ok(UploadHandle {
            id,
            cancel_token,
            progress_rx,
            result_rx: Some(result_rx),
            detached: false,
        })
    }

    #[instrument(skip(self), fields(upload_id = %self.id, provider = self.adapter.provider_name(), file = %strip_path(&self.path), total_size = self.total_size))]
    async fn run(mut self) {
        info!("Starting upload");

        let cancel_token = self.cancel_token.clone();
        // A panicking adapter or data provider still ends in exactly one
        // terminal notification
        let driven = AssertUnwindSafe(self.drive()).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Err(TransferError::Cancelled),
            result = driven => result.unwrap_or_else(|panic| {
                Err(TransferError::Internal(format!(
                    "upload task panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }),
        };

        self.finish(outcome);
    }

    async fn drive(&mut self) -> Result<UploadSummary> {
        let request = self
            .adapter
            .build_create_session_request(&self.path, self.total_size)?;
        let response = self.send(request, None).await?;
        let grant = response.parse(|r| self.adapter.parse_create_session_response(r))?;

        if grant.part_size == 0 {
            return Err(TransferError::bad_response("session granted a part size of 0")
                .with_context(&response.url, None));
        }

        let target = UploadTarget::new(self.total_size, grant.part_size, grant.session);
        debug!(part_size = target.part_size(), "Upload session created");
        let mut range = TransferRange::first(target.part_size(), self.total_size);
        // Last server-dictated range, cleared once a part is accepted
        let mut last_directive: Option<TransferRange> = None;
        self.state.target = Some(target);
        self.transition(UploadStatus::SessionCreated);

        loop {
            self.state.current_range = Some(range);
            self.transition(UploadStatus::PartInFlight);

            let session = self.session()?.clone();
            let data = self.read_part(range).await?;
            let request = self
                .adapter
                .build_part_request(&session, range, self.total_size, data)?;
            let response = self.send(request, Some(range)).await?;
            let outcome =
                response.parse(|r| self.adapter.parse_part_response(r, range, self.total_size))?;
            self.state.parts_sent += 1;

            match outcome {
                PartOutcome::Completed { completion_id } => {
                    self.state.uploaded_so_far = self.total_size;
                    return Ok(UploadSummary {
                        id: self.id,
                        completion_id,
                        total_bytes: self.total_size,
                        parts_sent: self.state.parts_sent,
                    });
                }
                PartOutcome::Accepted => {
                    last_directive = None;
                    self.state.uploaded_so_far = range.upper_bound;
                    let part_size = self.part_size()?;
                    range = match range.following(part_size, self.total_size) {
                        Some(next) => next,
                        None => {
                            return Err(TransferError::bad_response(
                                "server accepted all bytes without confirming completion",
                            )
                            .with_context(&response.url, Some(range)));
                        }
                    };
                }
                PartOutcome::Continue {
                    next_range,
                    part_size,
                } => {
                    if !next_range.is_valid_for(self.total_size) {
                        return Err(TransferError::bad_response(format!(
                            "continuation range {} does not fit an upload of {} bytes",
                            next_range, self.total_size
                        ))
                        .with_context(&response.url, Some(range)));
                    }
                    if let Some(part_size) = part_size {
                        if part_size == 0 {
                            return Err(TransferError::bad_response(
                                "continuation revised the part size to 0",
                            )
                            .with_context(&response.url, Some(range)));
                        }
                        if let Some(target) = self.state.target.as_mut() {
                            target.revise_part_size(part_size);
                        }
                    }
                    if last_directive == Some(next_range) {
                        return Err(TransferError::bad_response(format!(
                            "server requested {} again without persisting it",
                            next_range
                        ))
                        .with_context(&response.url, Some(range)));
                    }
                    last_directive = Some(next_range);
                    debug!(sent = %range, next = %next_range, "Server dictated the next range");
                    self.state.uploaded_so_far = next_range.lower_bound;
                    range = next_range;
                }
            }
        }
    }

    fn session(&self) -> Result<&UploadSessionHandle> {
        self.state
            .target
            .as_ref()
            .map(UploadTarget::session)
            .ok_or_else(|| TransferError::Internal("upload target missing".to_string()))
    }

    fn part_size(&self) -> Result<u64> {
        self.state
            .target
            .as_ref()
            .map(UploadTarget::part_size)
            .ok_or_else(|| TransferError::Internal("upload target missing".to_string()))
    }

    async fn read_part(&self, range: TransferRange) -> Result<bytes::Bytes> {
        let data = self
            .data_provider
            .read_range(range)
            .await
            .map_err(|e| match e {
                TransferError::DataSource { .. } => e,
                other => TransferError::DataSource {
                    range,
                    message: other.to_string(),
                },
            })?;

        if data.len() as u64 != range.len() {
            return Err(TransferError::DataSource {
                range,
                message: format!("expected {} bytes, got {}", range.len(), data.len()),
            });
        }
        Ok(data)
    }

    /// Send one request; error statuses go through the adapter's mapper.
    async fn send(&self, request: HttpRequest, range: Option<TransferRange>) -> Result<SentResponse> {
        let url = request.url.clone();
        debug!(method = %request.method, range = ?range, "Sending upload request");

        let response = self.http_client.execute(request).await?;
        if response.is_error() {
            warn!(status = response.status, range = ?range, "Upload request rejected");
            return Err(self
                .adapter
                .map_server_error(response.status, &response.body, &self.path));
        }

        Ok(SentResponse {
            url,
            range,
            response,
        })
    }

    fn transition(&mut self, status: UploadStatus) {
        self.state.status = status;
        let progress = UploadProgress {
            id: self.id,
            status,
            uploaded_bytes: self.state.uploaded_so_far,
            total_bytes: self.total_size,
            current_range: self.state.current_range,
        };
        if let Some(observer) = &self.observer {
            observer.on_progress(&progress);
        }
        self.progress_tx.send_replace(progress);
    }

    fn finish(mut self, outcome: Result<UploadSummary>) {
        let status = match &outcome {
            Ok(_) => UploadStatus::Completed,
            Err(e) if e.is_cancelled() => UploadStatus::Cancelled,
            Err(_) => UploadStatus::Failed,
        };
        if let Some(registry) = &self.registry {
            registry.remove(self.id);
        }

        if status != UploadStatus::Completed {
            self.state.current_range = None;
        }
        self.transition(status);

        match &outcome {
            Ok(summary) => {
                info!(parts = summary.parts_sent, "Upload completed");
                if let Some(observer) = &self.observer {
                    observer.on_complete(summary);
                }
            }
            Err(error) => {
                if error.is_cancelled() {
                    info!("Upload cancelled");
                } else {
                    warn!(error = %error, "Upload failed");
                }
                if let Some(observer) = &self.observer {
                    observer.on_failure(error);
                }
            }
        }

        if status == UploadStatus::Cancelled {
            self.spawn_teardown();
        }

        if let Some(result_tx) = self.result_tx.take() {
            // Nobody waiting is fine
            let _ = result_tx.send(outcome);
        }
    }

    /// Fire-and-forget deletion of the server session after cancellation
    fn spawn_teardown(&self) {
        let Ok(session) = self.session() else {
            return;
        };
        let Some(request) = self.adapter.build_cancel_request(session) else {
            return;
        };

        let http_client = Arc::clone(&self.http_client);
        let id = self.id;
        tokio::spawn(async move {
            match http_client.execute(request).await {
                Ok(response) if response.is_error() => {
                    warn!(upload_id = %id, status = response.status, "Session teardown rejected");
                }
                Ok(_) => debug!(upload_id = %id, "Upload session deleted"),
                Err(e) => warn!(upload_id = %id, error = %e, "Session teardown failed"),
            }
        });
    }
}

/// A non-error response plus what is needed to attach context to parse errors
struct SentResponse {
    url: String,
    range: Option<TransferRange>,
    response: HttpResponse,
}

impl SentResponse {
    fn parse<T>(&self, parser: impl FnOnce(&HttpResponse) -> Result<T>) -> Result<T> {
        parser(&self.response).map_err(|e| e.with_context(&self.url, self.range))
    }
}

/// Caller's side of a running upload.
///
/// Dropping the handle cancels the upload unless [`detach`](Self::detach)
/// was called first.
#[derive(Debug)]
pub struct UploadHandle {
    id: UploadId,
    cancel_token: CancellationToken,
    progress_rx: watch::Receiver<UploadProgress>,
    result_rx: Option<oneshot::Receiver<Result<UploadSummary>>>,
    detached: bool,
}

impl UploadHandle {
    pub fn id(&self) -> UploadId {
        self.id
    }

    /// Request cancellation. Safe to call any number of times; does nothing
    /// once the upload has reached a terminal state.
    pub fn cancel(&self) {
        if !self.cancel_token.is_cancelled() {
            debug!(upload_id = %self.id, "Cancellation requested");
            self.cancel_token.cancel();
        }
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> UploadProgress {
        self.progress_rx.borrow().clone()
    }

    /// Receiver that is notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.progress_rx.clone()
    }

    /// Wait for the terminal result. Returns the same outcome the observer saw.
    pub async fn wait(mut self) -> Result<UploadSummary> {
        let result_rx = self
            .result_rx
            .take()
            .ok_or_else(|| TransferError::Internal("upload result already taken".to_string()))?;

        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Internal(
                "upload task ended without reporting a result".to_string(),
            )),
        }
    }

    /// Let the upload run to completion without this handle. The observer and
    /// the registry remain the only ways to follow it.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        if !self.detached && self.result_rx.is_some() {
            self.cancel();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
