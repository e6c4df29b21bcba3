use std::time::{Duration, Instant};

use meshprobe::{HarnessError, HttpPoller, RetryPolicy};

use crate::common::{TestServer, init_test_logging};

fn poller(budget_ms: u64) -> HttpPoller {
    HttpPoller::new(
        Duration::from_secs(2),
        RetryPolicy::new(Duration::from_millis(budget_ms)).with_interval(Duration::from_millis(50)),
    )
}

#[test]
fn test_poll_until_ready() {
    init_test_logging();
    crate::test_log!("TEST START: test_poll_until_ready");

    let server = TestServer::start(3);
    let body = poller(5_000).get(&server.url("/flaky")).unwrap();

    assert_eq!(body, "ready");
    assert_eq!(server.flaky_hits(), 4);

    crate::test_log!("TEST PASS: test_poll_until_ready");
}

#[test]
fn test_status_decides_success_not_body() {
    init_test_logging();
    crate::test_log!("TEST START: test_status_decides_success_not_body");

    let server = TestServer::start(0);
    let body = poller(1_000).get(&server.url("/error-body")).unwrap();
    assert!(body.starts_with("error:"));

    crate::test_log!("TEST PASS: test_status_decides_success_not_body");
}

#[test]
fn test_exhaustion_returns_last_status_and_body() {
    init_test_logging();
    crate::test_log!("TEST START: test_exhaustion_returns_last_status_and_body");

    let server = TestServer::start(0);
    let started = Instant::now();
    let err = poller(300).get(&server.url("/down")).unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(300));
    match err {
        HarnessError::HttpStatus { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "no healthy upstream");
        }
        other => panic!("expected HTTP status error, got {other:?}"),
    }

    crate::test_log!("TEST PASS: test_exhaustion_returns_last_status_and_body");
}

#[test]
fn test_get_once_does_not_retry() {
    init_test_logging();

    let server = TestServer::start(1);
    let err = poller(5_000).get_once(&server.url("/flaky")).unwrap_err();
    assert!(matches!(err, HarnessError::HttpStatus { status: 503, .. }));
    assert_eq!(server.flaky_hits(), 1);
}
