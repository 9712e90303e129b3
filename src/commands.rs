use anyhow::{Context, Result};
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::task::JoinError;
use tracing::warn;

use rangedl::{parse_header_args, DownloadConfig, Downloader, ProgressTracker};

use crate::cli::Args;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn config_from_args(args: &Args) -> Result<DownloadConfig> {
    // malformed headers must be caught before any request goes out
    let headers = parse_header_args(&args.headers)?;

    let mut config = DownloadConfig {
        workers: args.conns,
        output_dir: args.download_dir.clone(),
        headers,
        stall_timeout: (args.stall_timeout > 0).then(|| Duration::from_secs(args.stall_timeout)),
        ..Default::default()
    };
    if let Some(ua) = &args.user_agent {
        config.user_agent = ua.clone();
    }
    Ok(config)
}

pub async fn run_download(args: Args) -> Result<()> {
    let config = config_from_args(&args)?;
    let downloader = Downloader::new(config)?;

    let mut download = downloader
        .initialize(&args.url, args.output.clone())
        .await
        .with_context(|| format!("Failed to initialize download of {}", args.url))?;

    println!(
        "File size: {}; filename: {}",
        HumanBytes(download.size()),
        download.path().display()
    );

    let pb = ProgressBar::new(download.size());
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    pb.set_style(ProgressStyle::default_bar()
        .template(concat!(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] ",
            "{bytes:>12}/{total_bytes:<12} {bytes_per_sec:>12} {eta:>4} {msg}"
        ))?
        .progress_chars("=>-"));
    pb.set_message(format!("{} connection(s)", download.worker_count()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let tracker = download.tracker();
    download.start()?;
    let display = tokio::spawn(display_progress(tracker.clone(), pb.clone()));

    let result = download.wait().await;
    display_finished(display.await);

    let snapshot = tracker.snapshot();
    pb.set_position(snapshot.downloaded);
    match result {
        Ok(()) => {
            pb.finish_with_message(format!(
                "Completed in {} ({}/s)",
                HumanDuration(snapshot.elapsed),
                HumanBytes(snapshot.rate() as u64)
            ));
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message(format!("Failed: {}", snapshot.status));
            Err(e).with_context(|| format!("Failed to download {}", args.url))
        }
    }
}

/// Returns whether the display task ended cleanly.
fn display_finished(joined: std::result::Result<(), JoinError>) -> bool {
    match joined {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "progress display task failed");
            false
        }
    }
}

/// Polls the tracker until the download leaves `InProgress`.
async fn display_progress(tracker: ProgressTracker, pb: ProgressBar) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
        interval.tick().await;
        let snapshot = tracker.snapshot();
        pb.set_position(snapshot.downloaded);
        if snapshot.status.is_finished() {
            break;
        }
    }
}
