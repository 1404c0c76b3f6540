//! Streaming download proxy (spec §4.8).
//!
//! Presents a seekable byte source over one or more backend GETs: a single
//! ranged GET for a plain file, or a sequence of per-part GETs stitched
//! together for a split file. `into_chunk_stream` turns it into a
//! `futures::Stream` so `axum::body::Body::from_stream` can wrap it
//! directly for the HTTP response.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::backend::BackendClient;
use crate::error::ProxyError;
use crate::models::ResourceMeta;
use crate::path_util;

/// One physical part backing a (possibly split) logical file.
#[derive(Clone)]
struct Part {
    /// Canonical path of the physical object.
    path: String,
    /// Logical offset (within the whole file) where this part begins.
    start: u64,
    size: u64,
}

enum ActiveStream {
    None,
    Pending(Pin<Box<dyn std::future::Future<Output = Result<reqwest::Response, ProxyError>> + Send>>),
    Open(Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>),
}

pub struct DownloadProxy {
    backend: BackendClient,
    parts: Vec<Part>,
    pub content_length: u64,
    position: u64,
    part_idx: usize,
    active: ActiveStream,
    leftover: Bytes,
}

impl DownloadProxy {
    pub fn new(backend: BackendClient, path: &str, meta: &ResourceMeta) -> Self {
        let parts = match &meta.split_info {
            Some(split_info) => {
                let parent = path_util::parent(path);
                let mut offset = 0u64;
                split_info
                    .split_file_list
                    .iter()
                    .map(|p| {
                        let part = Part {
                            path: format!("{parent}{}", p.file_name),
                            start: offset,
                            size: p.file_size,
                        };
                        offset += p.file_size;
                        part
                    })
                    .collect()
            }
            None => vec![Part {
                path: path.to_string(),
                start: 0,
                size: meta.content_length,
            }],
        };
        Self {
            backend,
            parts,
            content_length: meta.content_length,
            position: 0,
            part_idx: 0,
            active: ActiveStream::None,
            leftover: Bytes::new(),
        }
    }

    /// `_locate_part(position)` (spec §4.8): the index of the part
    /// covering the current logical position.
    fn locate_part(&self, position: u64) -> usize {
        for (idx, part) in self.parts.iter().enumerate() {
            if position < part.start + part.size || idx == self.parts.len() - 1 {
                return idx;
            }
        }
        self.parts.len().saturating_sub(1)
    }

    /// Seek law (spec §4.8/§8): clamp to `[0, content_length]`, drop any
    /// buffered bytes, and tear down the live stream so the next read
    /// reopens at the new offset via `Range`.
    pub fn seek(&mut self, offset: i64) -> u64 {
        let new_position = offset.clamp(0, self.content_length as i64) as u64;
        if new_position != self.position {
            self.position = new_position;
            self.part_idx = self.locate_part(new_position);
            self.leftover = Bytes::new();
            self.active = ActiveStream::None;
        }
        self.position
    }

    fn open_part(&mut self) {
        let part = self.parts[self.part_idx].clone();
        let intra_offset = self.position - part.start;
        let backend = self.backend.clone();
        let url = backend.url_for(&part.path);
        let range_from = if intra_offset > 0 { Some(intra_offset) } else { None };
        self.active = ActiveStream::Pending(Box::pin(async move {
            backend.get_stream(&url, range_from).await
        }));
    }

    /// Reads up to `buf.len()` bytes, draining the leftover buffer first,
    /// then pulling from the active part, advancing to subsequent parts on
    /// exhaustion (spec §4.8). Returns 0 at end of the logical file.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() || self.position >= self.content_length {
            return Ok(0);
        }

        if self.leftover.is_empty() {
            self.pull_more().await?;
        }

        let n = buf.len().min(self.leftover.len());
        if n == 0 {
            return Ok(0);
        }
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover = self.leftover.slice(n..);
        self.position += n as u64;
        Ok(n)
    }

    /// Reads the entire remainder of the logical file (`n = -1` in spec
    /// terms).
    pub async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }

    async fn pull_more(&mut self) -> std::io::Result<()> {
        loop {
            match &mut self.active {
                ActiveStream::None => {
                    if self.part_idx >= self.parts.len() {
                        return Ok(());
                    }
                    self.open_part();
                }
                ActiveStream::Pending(fut) => {
                    let response = fut
                        .as_mut()
                        .await
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                    self.active = ActiveStream::Open(Box::pin(response.bytes_stream()));
                }
                ActiveStream::Open(stream) => {
                    match futures::StreamExt::next(stream).await {
                        Some(Ok(bytes)) if !bytes.is_empty() => {
                            self.leftover = bytes;
                            return Ok(());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            return Err(std::io::Error::new(std::io::ErrorKind::Other, e))
                        }
                        None => {
                            // Current part exhausted; advance to next part.
                            self.part_idx += 1;
                            self.active = ActiveStream::None;
                        }
                    }
                }
            }
        }
    }
}

/// Wraps a `DownloadProxy` into a plain async stream of chunks, suitable
/// for `axum::body::Body::from_stream`. Kept as a free function (rather
/// than a hand-rolled `Stream` impl) since the read path is itself async
/// end to end.
pub fn into_chunk_stream(
    mut proxy: DownloadProxy,
) -> impl Stream<Item = std::io::Result<Bytes>> {
    async_stream::try_stream! {
        loop {
            let mut buf = vec![0u8; 64 * 1024];
            let n = proxy.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            buf.truncate(n);
            yield Bytes::from(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendAuth;
    use crate::models::{SplitFilePart, SplitInfo, SplitInfoMeta};

    fn backend() -> BackendClient {
        BackendClient::new(
            "http://backend.example/webdav",
            BackendAuth { username: None, password: None },
            10,
        )
        .unwrap()
    }

    fn split_meta(sizes: &[u64]) -> ResourceMeta {
        let split_file_list = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| SplitFilePart {
                file_name: if i == 0 {
                    "big.dat".to_string()
                } else {
                    format!("big.dat.part{i:03}")
                },
                file_size: *size,
            })
            .collect();
        ResourceMeta {
            is_collection: false,
            content_length: sizes.iter().sum(),
            content_type: None,
            display_name: "big.dat".into(),
            etag: None,
            creation_date: None,
            last_modified: None,
            split_info: Some(SplitInfo {
                meta: SplitInfoMeta { content_length: sizes.iter().sum() },
                split_file_list,
            }),
        }
    }

    #[test]
    fn locate_part_picks_covering_part() {
        let meta = split_meta(&[100, 100, 50]);
        let proxy = DownloadProxy::new(backend(), "/big.dat", &meta);
        assert_eq!(proxy.locate_part(0), 0);
        assert_eq!(proxy.locate_part(99), 0);
        assert_eq!(proxy.locate_part(100), 1);
        assert_eq!(proxy.locate_part(199), 1);
        assert_eq!(proxy.locate_part(200), 2);
        assert_eq!(proxy.locate_part(249), 2);
    }

    #[test]
    fn seek_clamps_to_content_length_and_relocates_part() {
        let meta = split_meta(&[100, 100, 50]);
        let mut proxy = DownloadProxy::new(backend(), "/big.dat", &meta);
        assert_eq!(proxy.seek(150), 150);
        assert_eq!(proxy.part_idx, 1);
        assert_eq!(proxy.seek(-10), 0);
        assert_eq!(proxy.seek(10_000), 250);
    }

    #[test]
    fn part_paths_are_siblings_of_the_head() {
        let meta = split_meta(&[100, 100, 50]);
        let proxy = DownloadProxy::new(backend(), "/a/big.dat", &meta);
        let paths: Vec<&str> = proxy.parts.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/a/big.dat", "/a/big.dat.part001", "/a/big.dat.part002"]
        );
    }
}
