//! Split-file detection and manifest fan-out (spec §4.3).
//!
//! A logical file `X` exists when a listing contains both `X` and
//! `X.splitinfo`; trailing parts appear as `X.partNNN` siblings. This pass
//! removes the physical `.splitinfo`/`.partNNN` entries and merges the
//! fetched manifest into `X`'s meta.

use std::collections::HashMap;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::backend::BackendClient;
use crate::models::{ResourceMeta, SplitInfo};
use crate::path_util;

const SPLITINFO_SUFFIX: &str = ".splitinfo";

fn is_part_name(last_segment: &str) -> bool {
    match last_segment.rsplit_once(".part") {
        Some((_, digits)) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Runs the split-file post-pass over a freshly parsed listing, fetching
/// manifests concurrently (bounded to this listing's fan-out, joined
/// before returning — spec §4.3 step 2 / §5).
pub async fn resolve(
    backend: &BackendClient,
    mut listing: HashMap<String, ResourceMeta>,
) -> HashMap<String, ResourceMeta> {
    let mut heads = Vec::new();
    let mut to_remove = Vec::new();

    for key in listing.keys() {
        if let Some(head) = key.strip_suffix(SPLITINFO_SUFFIX) {
            if listing.contains_key(head) {
                heads.push(head.to_string());
            }
            to_remove.push(key.clone());
        } else if is_part_name(path_util::basename(key)) {
            to_remove.push(key.clone());
        }
    }

    if !heads.is_empty() {
        let mut fetches = FuturesUnordered::new();
        for head in &heads {
            let head = head.clone();
            fetches.push(async move {
                let splitinfo_path = format!("{}{}{}", path_util::parent(&head), path_util::basename(&head), SPLITINFO_SUFFIX);
                let url = backend.url_for(&splitinfo_path);
                let manifest = backend.get_bytes(&url).await.and_then(|bytes| {
                    serde_json::from_slice::<SplitInfo>(&bytes).ok()
                });
                (head, manifest)
            });
        }

        while let Some((head, manifest)) = fetches.next().await {
            match manifest {
                Some(manifest) => {
                    if let Some(meta) = listing.get_mut(&head) {
                        meta.content_length = manifest.meta.content_length;
                        meta.split_info = Some(manifest);
                    }
                }
                None => {
                    tracing::warn!(path = %head, "split-file manifest unreachable or malformed");
                }
            }
        }
    }

    for key in to_remove {
        listing.remove(&key);
    }

    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_part_suffix() {
        assert!(is_part_name("big.dat.part001"));
        assert!(is_part_name("big.dat.part999"));
        assert!(!is_part_name("big.dat"));
        assert!(!is_part_name("big.department"));
    }
}
