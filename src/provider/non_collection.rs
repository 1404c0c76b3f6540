//! Non-collection (file) operations (spec §4.7).
//!
//! Grounded on `webdav/nonCollection.py`'s `WebDAVProxyNonCollection` and
//! `webdav/fileObjectProxy.py`, generalized to split-file fanout on
//! delete/copy/move, which the original (pre-split-file) source didn't
//! need to handle.

use std::sync::Arc;

use crate::error::PartFailure;
use crate::models::ResourceMeta;
use crate::provider::{physical_paths, Provider};
use crate::stream::{DownloadProxy, UploadProxy};

pub struct NonCollectionHandle {
    provider: Arc<Provider>,
    pub path: String,
    is_moved: bool,
    meta: tokio::sync::OnceCell<ResourceMeta>,
}

impl NonCollectionHandle {
    pub(crate) fn new(provider: Arc<Provider>, path: String) -> Self {
        Self {
            provider,
            path,
            is_moved: false,
            meta: tokio::sync::OnceCell::new(),
        }
    }

    async fn meta(&self) -> &ResourceMeta {
        self.meta
            .get_or_init(|| async {
                self.provider
                    .get_meta(&self.path)
                    .await
                    .unwrap_or(ResourceMeta {
                        is_collection: false,
                        content_length: 0,
                        content_type: None,
                        display_name: String::new(),
                        etag: None,
                        creation_date: None,
                        last_modified: None,
                        split_info: None,
                    })
            })
            .await
    }

    pub fn backend_url(&self) -> String {
        self.provider.backend.url_for(&self.path)
    }

    pub async fn get_content_length(&self) -> u64 {
        self.meta().await.content_length
    }

    pub async fn get_content_type(&self) -> String {
        self.meta().await.content_type_or_default().to_string()
    }

    pub async fn get_creation_date(&self) -> Option<i64> {
        self.meta().await.creation_date
    }

    pub async fn get_display_name(&self) -> String {
        self.meta().await.display_name.clone()
    }

    pub async fn get_last_modified(&self) -> Option<i64> {
        self.meta().await.last_modified
    }

    pub async fn get_etag(&self) -> Option<String> {
        self.meta().await.etag.clone()
    }

    pub fn support_etag(&self) -> bool {
        true
    }

    pub fn support_ranges(&self) -> bool {
        true
    }

    /// Creates a download proxy bound to this file's meta, so split files
    /// get their full part list (spec §4.7 "Read content").
    pub async fn get_content(&self) -> DownloadProxy {
        let meta = self.meta().await.clone();
        DownloadProxy::new(self.provider.backend.clone(), &self.path, &meta)
    }

    /// Creates an upload proxy; the transfer starts immediately (spec
    /// §4.7 "Begin write").
    pub fn begin_write(&self, content_type: Option<String>) -> UploadProxy {
        UploadProxy::new(
            self.provider.backend.clone(),
            self.path.clone(),
            content_type,
            self.provider.file_max_size,
        )
    }

    /// Observes the upload's terminal status and invalidates the cache
    /// entry (spec §4.7 "End write").
    pub fn end_write(&self, with_errors: bool) {
        if with_errors {
            tracing::error!(path = %self.path, "upload finished with errors");
        }
        self.provider.cache.invalidate(&self.path);
    }

    /// Deletes the head, every physical part, and the `.splitinfo`
    /// sidecar when present, collecting a per-URL failure list instead of
    /// aborting (spec §4.7/§7 item 6). The cache entry is invalidated only
    /// when every physical delete succeeds.
    pub async fn delete(&mut self) -> Vec<PartFailure> {
        if self.is_moved {
            return Vec::new();
        }
        let meta = self.meta().await.clone();
        let paths = physical_paths(&self.path, &meta);
        let mut failures = Vec::new();

        for physical_path in &paths {
            let url = self.provider.backend.url_for(physical_path);
            match self.provider.backend.delete(&url).await {
                Ok(status) if status == 200 || status == 204 => {}
                Ok(status) => failures.push(PartFailure { url, status }),
                Err(_) => failures.push(PartFailure { url, status: 0 }),
            }
        }

        if failures.is_empty() {
            self.provider.cache.invalidate(&self.path);
        }
        failures
    }

    /// Copies or moves a (possibly split) file: the head, each part, and
    /// `.splitinfo` are renamed in parallel position, appending the
    /// original suffix to the destination name (spec §4.7).
    pub async fn copy_move_single(
        &mut self,
        dest_path: &str,
        is_move: bool,
        overwrite: Option<&str>,
    ) -> Vec<PartFailure> {
        let meta = self.meta().await.clone();
        let source_paths = physical_paths(&self.path, &meta);
        let mut failures = Vec::new();

        for source_path in &source_paths {
            let suffix = source_path.strip_prefix(&self.path).unwrap_or("");
            let dest_physical = format!("{dest_path}{suffix}");
            let url = self.provider.backend.url_for(source_path);
            let dest_url = self.provider.backend.url_for(&dest_physical);
            match self
                .provider
                .backend
                .copy_or_move(is_move, &url, &dest_url, overwrite)
                .await
            {
                Ok(status) if status == 201 || status == 204 => {}
                Ok(status) => failures.push(PartFailure { url, status }),
                Err(_) => failures.push(PartFailure { url, status: 0 }),
            }
        }

        if failures.is_empty() {
            self.is_moved = is_move;
            self.provider.cache.invalidate(&self.path);
            self.provider.cache.invalidate(dest_path);
        }
        failures
    }

    /// The server performs recursion itself; this layer never does (spec
    /// §4.7).
    pub fn support_recursive_move(&self) -> bool {
        false
    }
}
