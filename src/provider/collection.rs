//! Collection (directory) operations (spec §4.6).
//!
//! Grounded on `webdav/collection.py`'s `WebDAVProxyCollection`, generalized
//! to async and to the Rust error-list-not-exception idiom spec §4.6/§7
//! call for on delete/copy/move.

use std::sync::Arc;

use crate::error::{PartFailure, ProxyResult};
use crate::models::ResourceMeta;
use crate::provider::non_collection::NonCollectionHandle;
use crate::provider::Provider;

pub struct CollectionHandle {
    provider: Arc<Provider>,
    pub path: String,
    is_moved: bool,
    meta: tokio::sync::OnceCell<ResourceMeta>,
}

impl CollectionHandle {
    pub(crate) fn new(provider: Arc<Provider>, path: String) -> Self {
        Self {
            provider,
            path,
            is_moved: false,
            meta: tokio::sync::OnceCell::new(),
        }
    }

    async fn meta(&self) -> Option<&ResourceMeta> {
        self.meta
            .get_or_init(|| async {
                self.provider
                    .get_meta(&self.path)
                    .await
                    .unwrap_or(ResourceMeta {
                        is_collection: true,
                        content_length: 0,
                        content_type: None,
                        display_name: String::new(),
                        etag: None,
                        creation_date: None,
                        last_modified: None,
                        split_info: None,
                    })
            })
            .await;
        self.meta.get()
    }

    pub fn backend_url(&self) -> String {
        self.provider.backend.url_for(&self.path)
    }

    /// Creates a non-collection handle for a new member; the actual PUT is
    /// deferred to `begin_write` (spec §4.6).
    pub fn create_empty_resource(&self, name: &str) -> NonCollectionHandle {
        let path = join_child(&self.path, name, false);
        NonCollectionHandle::new(self.provider.clone(), path)
    }

    /// Creates a child collection via MKCOL.
    pub async fn create_collection(&self, name: &str) -> ProxyResult<()> {
        let path = join_child(&self.path, name, true);
        let url = self.provider.backend.url_for(&path);
        self.provider.backend.mkcol(&url).await
    }

    /// Lists direct children. `for_copy` short-circuits to an empty list
    /// when handling a COPY request (spec §4.6).
    pub async fn get_member_names(&self, for_copy: bool) -> ProxyResult<Vec<String>> {
        self.provider.list_members(&self.path, for_copy).await
    }

    /// Single backend DELETE; invalidates the cache prefix on success.
    /// Returns per-URL failures rather than raising (spec §4.6).
    pub async fn delete(&mut self) -> Vec<PartFailure> {
        if self.is_moved {
            return Vec::new();
        }
        let url = self.backend_url();
        match self.provider.backend.delete(&url).await {
            Ok(status) if status == 200 || status == 204 => {
                self.provider.cache.invalidate(&self.path);
                Vec::new()
            }
            Ok(status) => vec![PartFailure { url, status }],
            Err(_) => vec![PartFailure { url, status: 0 }],
        }
    }

    /// COPY/MOVE a directory. The backend is expected to recurse natively
    /// (spec §4.6); `Destination`/`Overwrite` come from the inbound
    /// request verbatim.
    pub async fn copy_move_single(
        &mut self,
        dest_path: &str,
        is_move: bool,
        overwrite: Option<&str>,
    ) -> Vec<PartFailure> {
        let dest_url = self.provider.backend.url_for(dest_path);
        let url = self.backend_url();
        match self
            .provider
            .backend
            .copy_or_move(is_move, &url, &dest_url, overwrite)
            .await
        {
            Ok(status) if status == 201 || status == 204 => {
                self.is_moved = is_move;
                self.provider.cache.invalidate(&self.path);
                self.provider.cache.invalidate(dest_path);
                Vec::new()
            }
            Ok(status) => vec![PartFailure { url, status }],
            Err(_) => vec![PartFailure { url, status: 0 }],
        }
    }

    pub fn support_recursive_delete(&self) -> bool {
        true
    }

    pub fn support_recursive_move(&self) -> bool {
        true
    }

    pub async fn get_creation_date(&self) -> Option<i64> {
        self.meta().await.and_then(|m| m.creation_date)
    }

    pub async fn get_display_name(&self) -> String {
        self.meta()
            .await
            .map(|m| m.display_name.clone())
            .unwrap_or_default()
    }

    pub async fn get_last_modified(&self) -> Option<i64> {
        self.meta().await.and_then(|m| m.last_modified)
    }

    pub async fn get_etag(&self) -> Option<String> {
        self.meta().await.and_then(|m| m.etag.clone())
    }
}

/// Builds the canonical path of a child of `dir`, which must already end
/// in `/`.
fn join_child(dir: &str, name: &str, is_collection: bool) -> String {
    let name = name.trim_matches('/');
    if is_collection {
        format!("{dir}{name}/")
    } else {
        format!("{dir}{name}")
    }
}
