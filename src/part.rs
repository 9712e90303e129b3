//! One byte range of the resource and the worker that fetches it.

use futures::{Stream, StreamExt};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::error::{DownloadError, Result};
use crate::output::OutputFile;
use crate::plan::PartRange;

/// A contiguous range assigned to one worker, plus its progress counter.
///
/// Clones share the counter, so the tracker can read what the worker writes.
#[derive(Debug, Clone)]
pub struct Part {
    pub index: usize,
    pub range: PartRange,
    downloaded: Arc<AtomicU64>,
}

impl Part {
    pub fn new(index: usize, range: PartRange) -> Self {
        Self {
            index,
            range,
            downloaded: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn offset(&self) -> u64 {
        self.range.offset
    }

    pub fn size(&self) -> u64 {
        self.range.size
    }

    /// Bytes written to the output file so far.
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded() >= self.size()
    }
}

pub(crate) struct PartWorker {
    pub part: Part,
    pub client: Client,
    pub url: Url,
    pub headers: HeaderMap,
    pub file: Arc<OutputFile>,
    pub cancel: CancellationToken,
    pub buffer_size: usize,
    pub stall_timeout: Option<Duration>,
}

impl PartWorker {
    /// Fetches the part into the output file.
    ///
    /// Returns `Ok(())` when the range is filled, the body ends early, or the
    /// download was cancelled.
    pub async fn run(self) -> Result<()> {
        let index = self.part.index;
        let offset = self.part.offset();
        let size = self.part.size();
        let Some(last) = self.part.range.last_byte() else {
            debug!(part = index, "empty part, nothing to fetch");
            return Ok(());
        };

        let request = self
            .client
            .get(self.url.clone())
            .headers(self.headers.clone())
            .header(header::RANGE, format!("bytes={offset}-{last}"));

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(part = index, "cancelled before request");
                return Ok(());
            }
            res = request.send() => {
                res.map_err(|source| DownloadError::Transfer { part: index, source })?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::TransferStatus { part: index, status });
        }
        // A full-body answer only lines up with the file when the part starts at zero.
        if status != StatusCode::PARTIAL_CONTENT && offset > 0 {
            return Err(DownloadError::RangeIgnored { part: index });
        }
        debug!(part = index, offset, size, %status, "part started");

        let stream = response.bytes_stream();
        futures::pin_mut!(stream);
        let mut written = 0u64;

        while written < size {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(part = index, written, "cancelled");
                    return Ok(());
                }
                next = read_next(&mut stream, self.stall_timeout) => next,
            };

            let mut bytes = match next {
                Ok(Some(Ok(bytes))) => bytes,
                Ok(Some(Err(source))) => {
                    return Err(DownloadError::Transfer { part: index, source });
                }
                Ok(None) => break,
                Err(after) => return Err(DownloadError::Stalled { part: index, after }),
            };

            while !bytes.is_empty() && written < size {
                if self.cancel.is_cancelled() {
                    debug!(part = index, written, "cancelled");
                    return Ok(());
                }
                let take = (size - written)
                    .min(self.buffer_size as u64)
                    .min(bytes.len() as u64) as usize;
                let chunk = bytes.split_to(take);
                self.file.write_at(&chunk, offset + written)?;
                written += take as u64;
                self.part.downloaded.fetch_add(take as u64, Ordering::Relaxed);
                trace!(part = index, written, "chunk written");
            }
        }

        debug!(part = index, written, size, "part finished");
        Ok(())
    }
}

/// Next item of `stream`, or the deadline that elapsed waiting for it.
async fn read_next<S>(
    stream: &mut S,
    stall_timeout: Option<Duration>,
) -> std::result::Result<Option<S::Item>, Duration>
where
    S: Stream + Unpin,
{
    match stall_timeout {
        Some(after) => tokio::time::timeout(after, stream.next())
            .await
            .map_err(|_| after),
        None => Ok(stream.next().await),
    }
}
