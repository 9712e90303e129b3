//! Metadata probe: discovers the resource size and, when needed, a filename.

use reqwest::header::{self, HeaderMap};
use reqwest::Client;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

use crate::error::{DownloadError, Result};
use crate::utils::sanitize_filename;

/// The remote entity being fetched.
#[derive(Debug, Clone)]
pub struct Resource {
    pub url: Url,
    pub size: u64,
    pub filename: PathBuf,
    pub headers: HeaderMap,
}

/// Sends a HEAD request and resolves size and output name.
///
/// `filename` wins when given; otherwise the name comes from the
/// `Content-Disposition` header.
pub async fn probe(
    client: &Client,
    url: Url,
    headers: HeaderMap,
    filename: Option<PathBuf>,
) -> Result<Resource> {
    let response = client
        .head(url.clone())
        .headers(headers.clone())
        .send()
        .await
        .map_err(DownloadError::ProbeRequest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::ProbeFailed(status));
    }

    let size = content_length(response.headers())?;
    let filename = match filename {
        Some(name) => name,
        None => PathBuf::from(filename_from_headers(response.headers())?),
    };
    debug!(url = %url, size, filename = %filename.display(), "probed resource");

    Ok(Resource {
        url,
        size,
        filename,
        headers,
    })
}

/// Reads `Content-Length` straight from the headers. A HEAD response has
/// no body, so the client's own length hint can't be trusted here.
pub fn content_length(headers: &HeaderMap) -> Result<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&size| size > 0)
        .ok_or(DownloadError::UnsupportedResource)
}

pub fn filename_from_headers(headers: &HeaderMap) -> Result<String> {
    headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| content_disposition::parse_content_disposition(s).filename_full())
        .and_then(|name| sanitize_filename(&name))
        .ok_or(DownloadError::FilenameRequired)
}
