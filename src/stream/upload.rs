//! Streaming upload proxy (spec §4.9).
//!
//! Bridges the framework's incoming request body chunks to one or more
//! outbound PUTs. A bounded `tokio::mpsc` channel plays the role of the
//! source's `queue.Queue`; a `tokio::spawn`ed task plays the role of its
//! upload thread. The channel closing (sender dropped) is the end-of-stream
//! sentinel, matching spec §9's "the contract is identical."

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::BackendClient;

const QUEUE_CAPACITY: usize = 5;

#[derive(Debug, Clone)]
pub struct UploadStatus {
    pub uploaded_bytes: u64,
    pub parts_written: u32,
    pub error: Option<String>,
}

/// Handed to the HTTP handler as the write sink for an incoming PUT body.
/// `write` backpressures the client when the outbound queue is full,
/// matching spec §5's "queue full -> writer blocks."
pub struct UploadProxy {
    sender: Option<mpsc::Sender<Bytes>>,
    status_rx: oneshot::Receiver<UploadStatus>,
    worker: tokio::task::JoinHandle<()>,
}

impl UploadProxy {
    /// Starts the worker task immediately — spec §4.7: "Write is
    /// immediately live: a background transfer is started before the
    /// first byte is accepted."
    pub fn new(
        backend: BackendClient,
        path: String,
        content_type: Option<String>,
        file_max_size: u64,
    ) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (status_tx, status_rx) = oneshot::channel();

        let worker = tokio::spawn(async move {
            let status = run_upload(backend, path, content_type, file_max_size, rx).await;
            let _ = status_tx.send(status);
        });

        Self {
            sender: Some(tx),
            status_rx,
            worker,
        }
    }

    /// Enqueues one chunk. Blocks (awaits) when the queue is full.
    pub async fn write(&mut self, data: Bytes) -> std::io::Result<usize> {
        let len = data.len();
        match &self.sender {
            Some(tx) => tx
                .send(data)
                .await
                .map(|_| len)
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "upload worker exited")),
            None => Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "upload already closed")),
        }
    }

    /// Signals end-of-stream by dropping the sender, then waits for the
    /// worker to finish and reports its terminal status (spec §4.9
    /// "Close").
    pub async fn close(mut self) -> UploadStatus {
        self.sender.take();
        let _ = self.worker.await;
        self.status_rx
            .await
            .unwrap_or(UploadStatus {
                uploaded_bytes: 0,
                parts_written: 0,
                error: Some("upload worker produced no status".to_string()),
            })
    }
}

/// The worker: consumes chunks off `rx`, shards them into `file_max_size`
/// bounded parts, PUTs each part, and emits a `.splitinfo` manifest when
/// more than one part was written (spec §4.9 sharding protocol).
async fn run_upload(
    backend: BackendClient,
    path: String,
    content_type: Option<String>,
    file_max_size: u64,
    mut rx: mpsc::Receiver<Bytes>,
) -> UploadStatus {
    let mut part_sizes: Vec<u64> = Vec::new();
    let mut total_bytes = 0u64;
    let mut holdover: Option<Bytes> = None;
    let mut part_index = 0u32;

    loop {
        let url = part_url(&backend, &path, part_index);
        let (body_tx, body_rx) = mpsc::channel::<reqwest::Result<Bytes>>(QUEUE_CAPACITY);

        // Run the collector as its own task so it can keep filling `body_tx`
        // while the PUT below drains `body_rx` concurrently — collecting a
        // part to completion before starting its PUT would deadlock once a
        // part needs more chunks than the channel can hold.
        let collector = tokio::spawn(collect_part(rx, holdover.take(), file_max_size, body_tx));

        let reqwest_body = reqwest::Body::wrap_stream(ReceiverStream::new(body_rx));
        let put_result = backend
            .put_stream(&url, reqwest_body, content_type.as_deref())
            .await;

        let (returned_rx, part_len, next_holdover, ended) = match collector.await {
            Ok(result) => result,
            Err(_) => {
                return UploadStatus {
                    uploaded_bytes: total_bytes,
                    parts_written: part_index,
                    error: Some("upload part collector task panicked".to_string()),
                };
            }
        };
        rx = returned_rx;
        holdover = next_holdover;

        if part_len == 0 && ended && part_index > 0 {
            // Nothing left to upload for an additional part.
            break;
        }

        if let Err(e) = put_result {
            return UploadStatus {
                uploaded_bytes: total_bytes,
                parts_written: part_index,
                error: Some(e.to_string()),
            };
        }

        part_sizes.push(part_len);
        total_bytes += part_len;
        part_index += 1;

        if ended {
            break;
        }
    }

    if part_sizes.len() > 1 {
        if let Err(e) = emit_manifest(&backend, &path, &part_sizes, total_bytes).await {
            return UploadStatus {
                uploaded_bytes: total_bytes,
                parts_written: part_index,
                error: Some(e.to_string()),
            };
        }
    }

    UploadStatus {
        uploaded_bytes: total_bytes,
        parts_written: part_index,
        error: None,
    }
}

fn part_url(backend: &BackendClient, path: &str, part_index: u32) -> String {
    if part_index == 0 {
        backend.url_for(path)
    } else {
        backend.url_for(&format!("{path}.part{part_index:03}"))
    }
}

/// Drains chunks from `rx` (starting with any holdover from the previous
/// part) into `body_tx`, the channel that the caller is already streaming
/// out as this part's PUT body, up to `file_max_size` bytes. Takes `rx` by
/// value (and hands it back) so this can run as its own task concurrently
/// with the PUT that consumes `body_tx`'s receiver. Returns `rx`, the byte
/// count placed in this part, any overflow chunk stashed for the next
/// part, and whether the overall input stream has ended.
async fn collect_part(
    mut rx: mpsc::Receiver<Bytes>,
    holdover: Option<Bytes>,
    file_max_size: u64,
    body_tx: mpsc::Sender<reqwest::Result<Bytes>>,
) -> (mpsc::Receiver<Bytes>, u64, Option<Bytes>, bool) {
    let mut part_len = 0u64;
    let mut pending = holdover;
    let mut ended = false;

    loop {
        let chunk = match pending.take() {
            Some(c) => c,
            None => match rx.recv().await {
                Some(c) => c,
                None => {
                    ended = true;
                    break;
                }
            },
        };

        if file_max_size > 0 && part_len + chunk.len() as u64 > file_max_size {
            let room = (file_max_size - part_len) as usize;
            if room > 0 {
                let (head, tail) = chunk.split_at(room);
                let head = Bytes::copy_from_slice(head);
                let tail = Bytes::copy_from_slice(tail);
                part_len += head.len() as u64;
                let _ = body_tx.send(Ok(head)).await;
                if !tail.is_empty() {
                    pending = Some(tail);
                }
            } else {
                pending = Some(chunk);
            }
            // End this part; stash the remainder for the next one.
            return (rx, part_len, pending, false);
        }

        part_len += chunk.len() as u64;
        if body_tx.send(Ok(chunk)).await.is_err() {
            break;
        }
    }

    (rx, part_len, None, ended)
}

/// Emits the `<head>.splitinfo` sidecar manifest once the final PUT has
/// finished and more than one part was written (spec §4.9/§6).
async fn emit_manifest(
    backend: &BackendClient,
    path: &str,
    part_sizes: &[u64],
    total_bytes: u64,
) -> crate::error::ProxyResult<()> {
    use crate::models::{SplitFilePart, SplitInfo, SplitInfoMeta};

    let head_name = crate::path_util::basename(path).to_string();
    let split_file_list = part_sizes
        .iter()
        .enumerate()
        .map(|(i, size)| SplitFilePart {
            file_name: if i == 0 {
                head_name.clone()
            } else {
                format!("{head_name}.part{i:03}")
            },
            file_size: *size,
        })
        .collect();

    let manifest = SplitInfo {
        meta: SplitInfoMeta { content_length: total_bytes },
        split_file_list,
    };
    let json = serde_json::to_vec(&manifest)?;
    let url = backend.url_for(&format!("{path}.splitinfo"));
    backend
        .put_stream(&url, reqwest::Body::from(json), Some("application/json"))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_part_splits_on_ceiling() {
        let (tx, rx) = mpsc::channel::<Bytes>(5);
        tx.send(Bytes::from(vec![0u8; 30])).await.unwrap();
        drop(tx);

        let (body_tx, mut body_rx) = mpsc::channel::<reqwest::Result<Bytes>>(5);
        let (_rx, len, holdover, ended) = collect_part(rx, None, 20, body_tx).await;
        assert_eq!(len, 20);
        assert!(holdover.is_some());
        assert_eq!(holdover.unwrap().len(), 10);
        assert!(!ended);
        let first = body_rx.recv().await.unwrap().unwrap();
        assert_eq!(first.len(), 20);
    }

    #[tokio::test]
    async fn collect_part_drains_to_end_of_stream() {
        let (tx, rx) = mpsc::channel::<Bytes>(5);
        tx.send(Bytes::from(vec![0u8; 10])).await.unwrap();
        tx.send(Bytes::from(vec![0u8; 5])).await.unwrap();
        drop(tx);

        let (body_tx, _body_rx) = mpsc::channel::<reqwest::Result<Bytes>>(5);
        let (_rx, len, holdover, ended) = collect_part(rx, None, 1000, body_tx).await;
        assert_eq!(len, 15);
        assert!(holdover.is_none());
        assert!(ended);
    }
}
