//! # Cloud Client
//!
//! The facade applications use: one provider adapter plus one HTTP client,
//! exposing full directory listings and tracked uploads.
//!
//! Capabilities follow the adapter. Listing methods exist only when the
//! adapter implements [`ListingAdapter`], upload methods only when it
//! implements [`UploadAdapter`].

use bridge_traits::http::HttpClient;
use bridge_traits::storage::RemoteFile;
use bytes::Bytes;
use core_runtime::config::CoreConfig;
use core_runtime::logging::strip_path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::adapter::{DirectoryListing, ListingAdapter, ProviderAdapter, UploadAdapter};
use crate::data_provider::{DataProvider, FileDataProvider, MemoryDataProvider};
use crate::error::Result;
use crate::pagination::{PageResult, Paginator};
use crate::registry::UploadRegistry;
use crate::upload::{ChunkedUploadSession, UploadHandle, UploadId, UploadOptions};

/// Entry point for listing and uploading against one provider
pub struct CloudClient<A> {
    http_client: Arc<dyn HttpClient>,
    adapter: Arc<A>,
    uploads: Arc<UploadRegistry>,
}

impl<A> Clone for CloudClient<A> {
    fn clone(&self) -> Self {
        Self {
            http_client: Arc::clone(&self.http_client),
            adapter: Arc::clone(&self.adapter),
            uploads: Arc::clone(&self.uploads),
        }
    }
}

impl<A: ProviderAdapter + 'static> CloudClient<A> {
    pub fn new(http_client: Arc<dyn HttpClient>, adapter: A) -> Self {
        Self {
            http_client,
            adapter: Arc::new(adapter),
            uploads: Arc::new(UploadRegistry::new()),
        }
    }

    /// Use the HTTP client from a validated [`CoreConfig`].
    pub fn from_config(config: &CoreConfig, adapter: A) -> Self {
        Self::new(Arc::clone(&config.http_client), adapter)
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Ids of uploads started through this client that are still running
    pub fn active_uploads(&self) -> Vec<UploadId> {
        self.uploads.active_ids()
    }

    /// Cancel one upload by id; `false` if it is not running.
    pub fn cancel_upload(&self, id: UploadId) -> bool {
        self.uploads.cancel(id)
    }

    /// Cancel every running upload; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let count = self.uploads.cancel_all();
        if count > 0 {
            info!(count, provider = self.adapter.provider_name(), "Cancelling all uploads");
        }
        count
    }
}

impl<A: ListingAdapter + 'static> CloudClient<A> {
    /// List every entry under `root_path`, or fail without partial results.
    pub async fn list_all(&self, root_path: &str) -> Result<Vec<RemoteFile>> {
        self.list_all_partial(root_path).await.into_result()
    }

    /// List every entry under `root_path`. On error the entries from pages
    /// fetched before the failure are returned along with the error.
    #[instrument(skip(self, root_path), fields(provider = self.adapter.provider_name(), root = %strip_path(root_path)))]
    pub async fn list_all_partial(&self, root_path: &str) -> PageResult<RemoteFile> {
        let listing = DirectoryListing::new(self.adapter.as_ref(), root_path);
        let result = Paginator::new(self.http_client.as_ref(), &listing)
            .run_to_completion()
            .await;

        info!(
            items = result.items.len(),
            failed = result.error.is_some(),
            "Listing finished"
        );
        result
    }
}

impl<A: UploadAdapter + 'static> CloudClient<A> {
    /// Start an upload of `total_size` bytes from `data_provider` to
    /// `remote_path`. The upload is tracked until it reaches a terminal state.
    pub fn upload(
        &self,
        remote_path: &str,
        data_provider: Arc<dyn DataProvider>,
        total_size: u64,
        options: UploadOptions,
    ) -> Result<UploadHandle> {
        let adapter: Arc<dyn UploadAdapter> = self.adapter.clone();
        let handle = ChunkedUploadSession::start(
            Arc::clone(&self.http_client),
            adapter,
            remote_path,
            data_provider,
            total_size,
            options.with_registry(Arc::clone(&self.uploads)),
        )?;

        info!(upload_id = %handle.id(), file = %strip_path(remote_path), "Upload started");
        Ok(handle)
    }

    /// Upload an in-memory buffer
    pub fn upload_bytes(
        &self,
        remote_path: &str,
        data: impl Into<Bytes>,
        options: UploadOptions,
    ) -> Result<UploadHandle> {
        let provider = MemoryDataProvider::new(data);
        let total_size = provider.len();
        self.upload(remote_path, Arc::new(provider), total_size, options)
    }

    /// Upload a local file; its size is read once before the upload starts.
    pub async fn upload_file(
        &self,
        remote_path: &str,
        local_path: impl Into<PathBuf>,
        options: UploadOptions,
    ) -> Result<UploadHandle> {
        let provider = FileDataProvider::new(local_path);
        let total_size = provider.len().await?;
        self.upload(remote_path, Arc::new(provider), total_size, options)
    }
}
