use mockito::{Matcher, Server};
use rangedl::{DownloadConfig, DownloadError, Downloader, Status};
use reqwest::StatusCode;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

fn mock_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

async fn serve_ranges(
    server: &mut Server,
    path: &str,
    data: Vec<u8>,
    parts: usize,
) -> (mockito::Mock, mockito::Mock) {
    let head = server
        .mock("HEAD", path)
        .with_status(200)
        .with_header("content-length", &data.len().to_string())
        .with_header("content-disposition", r#"attachment; filename="payload.bin""#)
        .create_async()
        .await;
    let get = server
        .mock("GET", path)
        .match_header("range", Matcher::Regex(r"^bytes=\d+-\d+$".to_string()))
        .with_status(206)
        .expect(parts)
        .with_body_from_request(move |request| {
            let range = request.header("range")[0].to_str().unwrap().to_string();
            let (start, end) = range
                .trim_start_matches("bytes=")
                .split_once('-')
                .unwrap();
            let (start, end): (usize, usize) = (start.parse().unwrap(), end.parse().unwrap());
            data[start..=end].to_vec()
        })
        .create_async()
        .await;
    (head, get)
}

fn config(dir: &Path, workers: usize) -> DownloadConfig {
    DownloadConfig {
        workers,
        output_dir: Some(dir.to_path_buf()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_parallel_download_reassembles_file() {
    let mut server = Server::new_async().await;
    let data = mock_data(1000);
    let (head, get) = serve_ranges(&mut server, "/file", data.clone(), 3).await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 3)).unwrap();
    let mut download = downloader
        .initialize(&format!("{}/file", server.url()), Some("out.bin".into()))
        .await
        .unwrap();

    let sizes: Vec<u64> = download.parts().iter().map(|p| p.size()).collect();
    let offsets: Vec<u64> = download.parts().iter().map(|p| p.offset()).collect();
    assert_eq!(sizes, vec![333, 333, 334]);
    assert_eq!(offsets, vec![0, 333, 666]);

    download.run().await.unwrap();

    let snapshot = download.snapshot();
    assert_eq!(snapshot.status, Status::Completed);
    assert_eq!(snapshot.total, 1000);
    assert_eq!(snapshot.downloaded, 1000);
    assert_eq!(download.parts().iter().map(|p| p.downloaded()).sum::<u64>(), 1000);
    assert_eq!(std::fs::metadata(download.path()).unwrap().len(), 1000);
    assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), data);

    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_filename_from_content_disposition() {
    let mut server = Server::new_async().await;
    let data = mock_data(64);
    let _mocks = serve_ranges(&mut server, "/download/7", data.clone(), 2).await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 2)).unwrap();
    let mut download = downloader
        .initialize(&format!("{}/download/7", server.url()), None)
        .await
        .unwrap();

    assert_eq!(download.filename(), Path::new("payload.bin"));
    download.run().await.unwrap();
    assert_eq!(std::fs::read(dir.path().join("payload.bin")).unwrap(), data);
}

#[tokio::test]
async fn test_headers_sent_on_every_request() {
    let mut server = Server::new_async().await;
    let head = server
        .mock("HEAD", "/private")
        .match_header("authorization", "Bearer t0k3n")
        .with_status(200)
        .with_header("content-length", "8")
        .create_async()
        .await;
    let get = server
        .mock("GET", "/private")
        .match_header("authorization", "Bearer t0k3n")
        .match_header("range", "bytes=0-7")
        .with_status(206)
        .with_body("12345678")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 1);
    cfg.headers = rangedl::parse_header_args(&["Authorization=Bearer t0k3n"]).unwrap();
    let downloader = Downloader::new(cfg).unwrap();
    let mut download = downloader
        .initialize(&format!("{}/private", server.url()), Some("p".into()))
        .await
        .unwrap();
    download.run().await.unwrap();

    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_first_error_fails_download() {
    let mut server = Server::new_async().await;
    let _head = server
        .mock("HEAD", "/flaky")
        .with_status(200)
        .with_header("content-length", "1000")
        .create_async()
        .await;
    let _ok = server
        .mock("GET", "/flaky")
        .match_header("range", "bytes=0-499")
        .with_status(206)
        .with_body(vec![1u8; 500])
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/flaky")
        .match_header("range", "bytes=500-999")
        .with_status(500)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 2)).unwrap();
    let mut download = downloader
        .initialize(&format!("{}/flaky", server.url()), Some("flaky.bin".into()))
        .await
        .unwrap();
    download.start().unwrap();
    let err = download.wait().await.unwrap_err();

    match &err {
        DownloadError::TransferStatus { part, status } => {
            assert_eq!(*part, 1);
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
        }
        other => panic!("expected TransferStatus, got {other:?}"),
    }
    assert_eq!(download.status(), Status::Failed(err.to_string()));
    assert_eq!(download.snapshot().status.to_string(), err.to_string());
    assert!(matches!(download.wait().await, Err(DownloadError::Usage(_))));
}

#[tokio::test]
async fn test_failure_stops_slow_parts() {
    let mut server = Server::new_async().await;
    let _head = server
        .mock("HEAD", "/slow")
        .with_status(200)
        .with_header("content-length", "1000")
        .create_async()
        .await;
    // 10 bytes every 50ms: the full 500 would take 2.5s
    let _trickle = server
        .mock("GET", "/slow")
        .match_header("range", "bytes=0-499")
        .with_status(206)
        .with_chunked_body(|w| {
            for _ in 0..50 {
                w.write_all(&[7u8; 10])?;
                w.flush()?;
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(())
        })
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/slow")
        .match_header("range", "bytes=500-999")
        .with_status(500)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 2)).unwrap();
    let mut download = downloader
        .initialize(&format!("{}/slow", server.url()), Some("slow.bin".into()))
        .await
        .unwrap();
    let err = download.run().await.unwrap_err();

    assert!(matches!(err, DownloadError::TransferStatus { part: 1, .. }));
    assert!(download.parts()[0].downloaded() < download.parts()[0].size());
    assert!(matches!(download.status(), Status::Failed(_)));
    assert!(download.snapshot().elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_missing_length_creates_no_file() {
    let mut server = Server::new_async().await;
    let _head = server
        .mock("HEAD", "/live")
        .with_status(200)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 2)).unwrap();
    let result = downloader
        .initialize(&format!("{}/live", server.url()), Some("live.bin".into()))
        .await;

    assert!(matches!(result, Err(DownloadError::UnsupportedResource)));
    assert!(!dir.path().join("live.bin").exists());
}

#[tokio::test]
async fn test_missing_filename() {
    let mut server = Server::new_async().await;
    let _head = server
        .mock("HEAD", "/anon")
        .with_status(200)
        .with_header("content-length", "16")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 1)).unwrap();
    let result = downloader.initialize(&format!("{}/anon", server.url()), None).await;
    assert!(matches!(result, Err(DownloadError::FilenameRequired)));
}

#[tokio::test]
async fn test_snapshots_never_go_backwards() {
    let mut server = Server::new_async().await;
    let _mocks = serve_ranges(&mut server, "/file", mock_data(4096), 4).await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(config(dir.path(), 4)).unwrap();
    let mut download = downloader
        .initialize(&format!("{}/file", server.url()), Some("f.bin".into()))
        .await
        .unwrap();
    let tracker = download.tracker();

    download.start().unwrap();
    let poller = tokio::spawn(async move {
        let mut last = tracker.snapshot();
        loop {
            let next = tracker.snapshot();
            assert!(next.downloaded >= last.downloaded);
            assert!(next.elapsed >= last.elapsed);
            if next.status.is_finished() {
                return next;
            }
            last = next;
            tokio::task::yield_now().await;
        }
    });

    download.wait().await.unwrap();
    let last = poller.await.unwrap();
    assert_eq!(last.status, Status::Completed);
    assert_eq!(last.downloaded, 4096);
}

#[test]
fn test_zero_workers_is_usage_error() {
    let err = Downloader::new(DownloadConfig {
        workers: 0,
        ..Default::default()
    })
    .err()
    .unwrap();
    assert!(matches!(err, DownloadError::Usage(_)));
}
