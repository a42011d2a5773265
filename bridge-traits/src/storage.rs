//! Remote Storage Shapes
//!
//! The common file-metadata record every provider adapter translates its
//! service-specific JSON into.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A file or folder as reported by a remote drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned identifier
    pub id: String,

    /// Display name (last path component)
    pub name: String,

    /// Path relative to the drive root, when the provider reports one
    pub path: Option<String>,

    /// MIME type, if known
    pub mime_type: Option<String>,

    /// Size in bytes (absent for folders on most providers)
    pub size: Option<u64>,

    /// Creation time as Unix timestamp
    pub created_at: Option<i64>,

    /// Last modification time as Unix timestamp
    pub modified_at: Option<i64>,

    /// Whether this entry is a folder
    pub is_folder: bool,

    /// Parent folder IDs
    pub parent_ids: Vec<String>,

    /// Provider content hash (md5, sha1, quickXorHash...)
    pub content_hash: Option<String>,

    /// Provider-specific extras
    pub metadata: HashMap<String, String>,
}

impl RemoteFile {
    /// Minimal record with only an id and a name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: None,
            mime_type: None,
            size: None,
            created_at: None,
            modified_at: None,
            is_folder: false,
            parent_ids: Vec::new(),
            content_hash: None,
            metadata: HashMap::new(),
        }
    }
}
