//! # Google Drive Provider
//!
//! Listing and resumable-upload adapter for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder listing through `files.list` with `pageToken` pagination
//! - Resumable uploads (`uploadType=resumable`) in 256 KiB aligned parts,
//!   resuming from the `Range` the server reports on `308 Resume Incomplete`
//! - Session teardown by deleting the resumable session URI
//! - Drive error bodies mapped to `TransferError::ProviderReported`

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GoogleDriveConnector, UPLOAD_GRANULARITY};
pub use error::{GoogleDriveError, Result};
