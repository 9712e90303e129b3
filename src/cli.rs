use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Download a file over HTTP using parallel range requests",
    long_about = None
)]
pub struct Args {
    /// URL to fetch
    #[arg(index = 1)]
    pub url: String,

    /// Number of connections (parts fetched in parallel)
    #[arg(short = 'c', long = "conns", default_value_t = 1)]
    pub conns: usize,

    /// Output file name (defaults to the server's Content-Disposition name)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Directory to save the file in
    #[arg(short = 'd', long = "download-dir")]
    pub download_dir: Option<PathBuf>,

    /// Custom request header as key=value (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Abort a connection that receives no data for this many seconds (0 disables)
    #[arg(long = "stall-timeout", default_value_t = 60)]
    pub stall_timeout: u64,

    /// User-Agent sent with every request
    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,
}
