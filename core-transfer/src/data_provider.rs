//! Byte sources for uploads
//!
//! The upload engine asks for exactly one range at a time and never holds
//! more than one part in memory.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Result, TransferError};
use crate::range::TransferRange;

/// Produces the bytes of a requested range
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Must return exactly `range.len()` bytes or an error.
    async fn read_range(&self, range: TransferRange) -> Result<Bytes>;
}

/// In-memory source; ranges are zero-copy slices
#[derive(Debug, Clone)]
pub struct MemoryDataProvider {
    data: Bytes,
}

impl MemoryDataProvider {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl DataProvider for MemoryDataProvider {
    async fn read_range(&self, range: TransferRange) -> Result<Bytes> {
        if range.upper_bound > self.len() || range.lower_bound > range.upper_bound {
            return Err(TransferError::DataSource {
                range,
                message: format!("range is outside the {} available bytes", self.len()),
            });
        }
        Ok(self
            .data
            .slice(range.lower_bound as usize..range.upper_bound as usize))
    }
}

/// File-backed source; each read opens the file, seeks and reads the range
#[derive(Debug, Clone)]
pub struct FileDataProvider {
    path: PathBuf,
}

impl FileDataProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size, used as the upload's total size.
    pub async fn len(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| TransferError::InvalidArgument(format!("{}: {}", self.path.display(), e)))?;
        Ok(metadata.len())
    }
}

#[async_trait]
impl DataProvider for FileDataProvider {
    async fn read_range(&self, range: TransferRange) -> Result<Bytes> {
        let failure = |e: std::io::Error| TransferError::DataSource {
            range,
            message: format!("{}: {}", self.path.display(), e),
        };

        let mut file = tokio::fs::File::open(&self.path).await.map_err(failure)?;
        file.seek(std::io::SeekFrom::Start(range.lower_bound))
            .await
            .map_err(failure)?;

        let mut buffer = vec![0u8; range.len() as usize];
        file.read_exact(&mut buffer).await.map_err(failure)?;

        Ok(Bytes::from(buffer))
    }
}

/// Adapts a closure into a [`DataProvider`]
pub struct FnDataProvider<F> {
    read: F,
}

impl<F> FnDataProvider<F>
where
    F: Fn(TransferRange) -> Result<Bytes> + Send + Sync,
{
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

#[async_trait]
impl<F> DataProvider for FnDataProvider<F>
where
    F: Fn(TransferRange) -> Result<Bytes> + Send + Sync,
{
    async fn read_range(&self, range: TransferRange) -> Result<Bytes> {
        (self.read)(range)
    }
}
