//! Provider facade (spec §4.5): resolves a canonical path into a
//! collection or non-collection handle over the cache + backend.

pub mod collection;
pub mod non_collection;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::BackendClient;
use crate::cache::MetaCache;
use crate::error::ProxyResult;
use crate::models::ResourceMeta;
use crate::path_util;
use crate::{propfind, splitfile};

pub use collection::CollectionHandle;
pub use non_collection::NonCollectionHandle;

pub enum Resource {
    Collection(CollectionHandle),
    NonCollection(NonCollectionHandle),
}

pub struct Provider {
    pub backend: BackendClient,
    pub cache: MetaCache,
    pub file_max_size: u64,
    pub metadata_timeout: Duration,
}

impl Provider {
    /// Issues a `Depth: 1` PROPFIND against `folder_path`'s backend URL and
    /// runs the split-file resolver (spec §4.2/§4.3). `None` on any
    /// transport/protocol/parse failure — metadata is simply absent.
    async fn fetch_listing(&self, folder_path: &str) -> Option<HashMap<String, ResourceMeta>> {
        let url = self.backend.url_for(folder_path);
        let xml = self
            .backend
            .propfind(&url, "1", self.metadata_timeout)
            .await?;
        let listing = match propfind::parse_multistatus(&xml, &self.backend.base_url, &self.backend.base_path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %folder_path, error = %e, "PROPFIND parse failure");
                return None;
            }
        };
        Some(splitfile::resolve(&self.backend, listing).await)
    }

    /// `get(path)` (spec §4.4): cache hit short-circuits; on miss, fetches
    /// the parent folder listing, bulk-populates the cache, and re-reads.
    pub async fn get_meta(&self, path: &str) -> Option<ResourceMeta> {
        if let Some(meta) = self.cache.get(path) {
            return Some(meta);
        }
        let folder = path_util::parent(path);
        let listing = self.fetch_listing(&folder).await?;
        self.cache.set_bulk(listing);
        self.cache.get(path)
    }

    /// Lists a directory's direct children (spec §4.6 "List members").
    /// `for_copy` mirrors the source's COPY-request short-circuit: an
    /// empty list avoids recursive backend fan-out the server already
    /// handles itself.
    pub async fn list_members(&self, dir_path: &str, for_copy: bool) -> ProxyResult<Vec<String>> {
        if for_copy {
            return Ok(Vec::new());
        }
        let listing = self
            .fetch_listing(dir_path)
            .await
            .ok_or_else(|| crate::error::ProxyError::NotFound(dir_path.to_string()))?;
        let mut names: Vec<String> = listing
            .keys()
            .filter(|href| href.as_str() != dir_path)
            .filter_map(|href| href.strip_prefix(dir_path).map(|s| s.to_string()))
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        self.cache.set_bulk(listing);
        Ok(names)
    }

    /// `resolve(path)` (spec §4.5).
    pub async fn resolve(self: &Arc<Self>, path: &str) -> Option<Resource> {
        let meta = self.get_meta(path).await?;
        if meta.is_collection {
            Some(Resource::Collection(CollectionHandle::new(
                self.clone(),
                path.to_string(),
            )))
        } else {
            Some(Resource::NonCollection(NonCollectionHandle::new(
                self.clone(),
                path.to_string(),
            )))
        }
    }
}

/// Enumerates the physical backend paths making up a logical resource:
/// the head, each part in manifest order, and the `.splitinfo` sidecar
/// when present. For a plain (non-split) file this is just `[path]`.
pub(crate) fn physical_paths(path: &str, meta: &ResourceMeta) -> Vec<String> {
    let mut paths = vec![path.to_string()];
    if let Some(split_info) = &meta.split_info {
        let parent = path_util::parent(path);
        for part in split_info.split_file_list.iter().skip(1) {
            paths.push(format!("{parent}{}", part.file_name));
        }
        paths.push(format!("{path}.splitinfo"));
    }
    paths
}
