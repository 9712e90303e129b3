//! Parallel HTTP range downloader.
//!
//! A resource is probed with `HEAD`, split into contiguous byte ranges, and
//! each range is fetched by its own task and written straight into the
//! output file at its offset.
//!
//! ```rust,no_run
//! use rangedl::{DownloadConfig, Downloader};
//!
//! # async fn demo() -> rangedl::Result<()> {
//! let downloader = Downloader::new(DownloadConfig { workers: 4, ..Default::default() })?;
//! let mut download = downloader
//!     .initialize("https://example.com/big.iso", None)
//!     .await?;
//! let tracker = download.tracker();
//! download.start()?;
//! // poll `tracker.snapshot()` from elsewhere while waiting
//! download.wait().await?;
//! assert_eq!(tracker.snapshot().downloaded, download.size());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod output;
pub mod part;
pub mod plan;
pub mod probe;
pub mod state;
mod utils;

pub use config::{parse_header_arg, parse_header_args, DownloadConfig, DEFAULT_BUFFER_SIZE};
pub use downloader::{Download, Downloader, ProgressTracker};
pub use error::{DownloadError, Result};
pub use part::Part;
pub use plan::{plan, PartRange};
pub use probe::Resource;
pub use state::{ProgressSnapshot, Status};
