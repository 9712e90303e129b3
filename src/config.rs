use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DownloadError, Result};

/// Read size for a part's response body.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Number of parts fetched concurrently.
    pub workers: usize,
    /// Directory the output file is placed in. `None` keeps the name as given.
    pub output_dir: Option<PathBuf>,
    /// Sent with the probe and with every ranged request.
    pub headers: HeaderMap,
    pub buffer_size: usize,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Give up on a part when its body stays silent this long. `None` waits forever.
    pub stall_timeout: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            output_dir: None,
            headers: HeaderMap::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            user_agent: concat!("rangedl/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            stall_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl DownloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DownloadError::usage("worker count must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(DownloadError::usage("buffer size must be at least 1 byte"));
        }
        Ok(())
    }

    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| DownloadError::usage(format!("cannot build HTTP client: {e}")))
    }
}

/// Parses a `key=value` header argument. Both sides must be non-empty.
pub fn parse_header_arg(arg: &str) -> Result<(HeaderName, HeaderValue)> {
    let invalid = || DownloadError::usage(format!("invalid header argument: {arg:?}"));

    let (key, value) = arg.split_once('=').ok_or_else(invalid)?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(invalid());
    }

    let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((name, value))
}

pub fn parse_header_args<S: AsRef<str>>(args: &[S]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(args.len());
    for arg in args {
        let (name, value) = parse_header_arg(arg.as_ref())?;
        headers.insert(name, value);
    }
    Ok(headers)
}
