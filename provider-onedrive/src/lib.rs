//! # OneDrive Provider
//!
//! Listing and upload-session adapter for OneDrive through Microsoft Graph.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder listing via `/children`, following `@odata.nextLink`
//! - Upload sessions (`createUploadSession`) in 320 KiB aligned parts,
//!   resuming wherever `nextExpectedRanges` points
//! - Session teardown by deleting the upload URL
//! - Graph error envelopes mapped to `TransferError::ProviderReported`

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{OneDriveConnector, UPLOAD_GRANULARITY};
pub use error::{OneDriveError, Result};
