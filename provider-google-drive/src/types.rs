//! Drive v3 wire types
//!
//! Only the fields the connector asks for through `fields=` are modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub(crate) const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A `files` resource as returned by `files.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Drive encodes int64 as a JSON string; absent for folders and
    /// Google-native documents
    #[serde(default, deserialize_with = "int64_string")]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub md5_checksum: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    /// Value for the `files(...)` part of a `fields=` selector.
    pub const FIELDS: &'static str =
        "id,name,mimeType,size,createdTime,modifiedTime,md5Checksum,parents,trashed";

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

fn int64_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Text(String),
        Number(u64),
    }

    match Option::<Int64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Int64::Number(n)) => Ok(Some(n)),
        Some(Int64::Text(text)) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Set when Drive could not search every corpus
    #[serde(default)]
    pub incomplete_search: bool,
}

/// JSON body of the resumable session initiation request.
#[derive(Debug, Serialize)]
pub struct NewFileMetadata<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<[&'a str; 1]>,
}

/// Body of the final `200`/`201` of a resumable upload (`fields=id`).
#[derive(Debug, Deserialize)]
pub struct CreatedFile {
    pub id: String,
}

/// `{"error": {...}}` envelope shared by every Google API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

impl ApiErrorBody {
    /// First machine-readable reason, e.g. `userRateLimitExceeded`.
    pub fn reason(&self) -> Option<&str> {
        self.errors.first().map(|detail| detail.reason.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
}
