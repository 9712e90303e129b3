use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Everything that can stop a download.
///
/// Probe and file-setup errors are returned from `Downloader::initialize`
/// before any worker exists. Worker errors surface from `Download::wait`,
/// where the first one received becomes the terminal failure.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The HEAD request could not be sent or answered.
    #[error("probe request failed: {0}")]
    ProbeRequest(#[source] reqwest::Error),

    /// The HEAD request got a non-success status.
    #[error("probe failed: {0}")]
    ProbeFailed(StatusCode),

    /// The server did not report a usable `Content-Length`.
    #[error("not supported for download: server did not report the resource size")]
    UnsupportedResource,

    /// No output filename was given and none could be derived from
    /// `Content-Disposition`.
    #[error("no output filename given and none found in 'Content-Disposition'")]
    FilenameRequired,

    #[error("file error on {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("part {part}: {source}")]
    Transfer {
        part: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("part {part}: server answered {status}")]
    TransferStatus { part: usize, status: StatusCode },

    /// The server answered a ranged request with the whole body.
    #[error("part {part}: server ignored the Range header")]
    RangeIgnored { part: usize },

    #[error("part {part}: no data received for {after:?}")]
    Stalled { part: usize, after: Duration },

    /// The body ended before the part's range was filled.
    #[error("part {part}: body ended {missing} bytes short")]
    Incomplete { part: usize, missing: u64 },

    #[error("worker task failed: {0}")]
    WorkerPanicked(String),

    #[error("usage error: {0}")]
    Usage(String),
}

impl DownloadError {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub(crate) fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Index of the part that produced this error, if any.
    pub fn part(&self) -> Option<usize> {
        match self {
            Self::Transfer { part, .. }
            | Self::TransferStatus { part, .. }
            | Self::RangeIgnored { part }
            | Self::Incomplete { part, .. }
            | Self::Stalled { part, .. } => Some(*part),
            _ => None,
        }
    }
}
