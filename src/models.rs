//! Resource metadata model (spec §3).

use serde::{Deserialize, Serialize};

/// One entry in a split file's manifest (`splitFileList[i]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitFilePart {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileSize")]
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitInfoMeta {
    pub content_length: u64,
}

/// The `<file>.splitinfo` sidecar document (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitInfo {
    pub meta: SplitInfoMeta,
    #[serde(rename = "splitFileList")]
    pub split_file_list: Vec<SplitFilePart>,
}

impl SplitInfo {
    /// `splitFileList[0]` must name the head file's basename (spec §3 invariant).
    pub fn head_name(&self) -> Option<&str> {
        self.split_file_list.first().map(|p| p.file_name.as_str())
    }
}

/// The unit stored in the metadata cache (spec §3: "Resource meta").
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMeta {
    pub is_collection: bool,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub display_name: String,
    pub etag: Option<String>,
    pub creation_date: Option<i64>,
    pub last_modified: Option<i64>,
    pub split_info: Option<SplitInfo>,
}

impl ResourceMeta {
    /// Effective content type, falling back to `application/octet-stream`
    /// as spec §3/§4.7 require.
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }

    pub fn is_split_file(&self) -> bool {
        self.split_info.is_some()
    }

    /// Physical part names in manifest order, including the head (basename
    /// only, no directory). Empty for a non-split file.
    pub fn part_names(&self) -> Vec<String> {
        self.split_info
            .as_ref()
            .map(|si| {
                si.split_file_list
                    .iter()
                    .map(|p| p.file_name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
