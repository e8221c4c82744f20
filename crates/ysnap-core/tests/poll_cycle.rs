mod common;

use chrono::Utc;
use common::{FakeVendor, PICTURE_URL, creds, device};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;
use ysnap_core::{Error, ImageArchiver, Poller, Token, TokenManager};

fn poller(vendor: FakeVendor, dir: &std::path::Path) -> Poller<FakeVendor> {
    let archiver = ImageArchiver::new(dir.join("now.jpg"), dir.join("img"));
    Poller::new(vendor, creds(), device(), archiver)
}

fn history_entries(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    match fs::read_dir(dir.join("img")) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn successful_tick_writes_latest_and_history() {
    let dir = tempdir().unwrap();
    let mut poller = poller(FakeVendor::new(b"B"), dir.path());

    let report = poller.tick().await.expect("cycle succeeds");
    assert!(report.token_refreshed);
    assert_eq!(report.bytes, 1);
    assert_eq!(fs::read(dir.path().join("now.jpg")).unwrap(), b"B");

    let history = history_entries(dir.path());
    assert_eq!(history, vec![report.history_path.clone()]);
    assert_eq!(fs::read(&history[0]).unwrap(), b"B");
    let name = history[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with(".jpg"));
    assert_eq!(name.len(), "2006-01-02 15-04-05.jpg".len());

    assert_eq!(
        *poller.api().downloads.lock().unwrap(),
        vec![PICTURE_URL.to_string()]
    );
}

#[tokio::test]
async fn rejected_capture_leaves_latest_untouched() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("now.jpg"), b"previous").unwrap();
    let vendor = FakeVendor::new(b"B").with_capture_codes(&["504"]);
    let mut poller = poller(vendor, dir.path());

    match poller.run_cycle().await {
        Err(Error::Capture(err)) => assert_eq!(err.code(), Some("504")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(fs::read(dir.path().join("now.jpg")).unwrap(), b"previous");
    assert!(history_entries(dir.path()).is_empty());
    assert!(poller.api().downloads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn capture_error_does_not_stop_later_ticks() {
    let dir = tempdir().unwrap();
    let vendor = FakeVendor::new(b"B").with_capture_codes(&["504"]);
    let mut poller = poller(vendor, dir.path());

    assert!(poller.tick().await.is_none());
    let report = poller.tick().await.expect("second tick succeeds");
    assert!(!report.token_refreshed);

    assert_eq!(poller.api().captures_with(), vec!["tok-1", "tok-1"]);
    assert_eq!(fs::read(dir.path().join("now.jpg")).unwrap(), b"B");
}

#[tokio::test]
async fn auth_failure_skips_capture_and_retries_next_tick() {
    let dir = tempdir().unwrap();
    let vendor = FakeVendor::new(b"B");
    *vendor.reject_token.lock().unwrap() = true;
    let mut poller = poller(vendor, dir.path());

    assert!(matches!(poller.run_cycle().await, Err(Error::Auth(_))));
    assert!(poller.api().captures_with().is_empty());

    *poller.api().reject_token.lock().unwrap() = false;
    assert!(poller.tick().await.is_some());
    assert_eq!(poller.api().token_calls(), 2);
    assert_eq!(poller.api().captures_with(), vec!["tok-2"]);
}

#[tokio::test]
async fn valid_token_is_not_refreshed_before_capture() {
    let dir = tempdir().unwrap();
    let mut poller = poller(FakeVendor::new(b"B"), dir.path());
    *poller.tokens_mut() = TokenManager::with_token(Token {
        access_token: "live".into(),
        expires_at_ms: Utc::now().timestamp_millis() + 3_600_000,
    });

    poller.run_cycle().await.unwrap();
    assert_eq!(poller.api().token_calls(), 0);
    assert_eq!(poller.api().captures_with(), vec!["live"]);
}

#[tokio::test]
async fn expired_token_is_refreshed_before_capture() {
    let dir = tempdir().unwrap();
    let mut poller = poller(FakeVendor::new(b"B"), dir.path());
    *poller.tokens_mut() = TokenManager::with_token(Token {
        access_token: "expired".into(),
        expires_at_ms: Utc::now().timestamp_millis() - 1,
    });

    let report = poller.run_cycle().await.unwrap();
    assert!(report.token_refreshed);
    assert_eq!(poller.api().token_calls(), 1);
    assert_eq!(poller.api().captures_with(), vec!["tok-1"]);
}

#[tokio::test]
async fn storage_failure_is_reported_for_the_cycle() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("img"), b"in the way").unwrap();
    let mut poller = poller(FakeVendor::new(b"B"), dir.path());

    assert!(matches!(poller.run_cycle().await, Err(Error::Storage(_))));
    assert!(poller.tick().await.is_none());
}

#[tokio::test]
async fn run_accepts_out_of_range_periods() {
    let dir = tempdir().unwrap();
    let mut poller = poller(FakeVendor::new(b"B"), dir.path());

    for period in [Duration::MAX, Duration::ZERO] {
        let stopped = tokio::time::timeout(Duration::from_millis(20), poller.run(period)).await;
        assert!(stopped.is_err());
    }
    assert!(!dir.path().join("now.jpg").exists());
}
