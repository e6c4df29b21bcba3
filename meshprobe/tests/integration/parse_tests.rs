use std::cell::Cell;
use std::time::Duration;

use meshprobe::{ControlPlaneHarness, HarnessError, HarnessResult, KubeApi, parse_rows};
use serde_json::json;

use crate::common::{FakeBinary, init_test_logging};

const STAT_OUTPUT: &str = "\
NAME     STATUS   MESHED   SUCCESS   RPS      LATENCY_P50   LATENCY_P95   LATENCY_P99   TCP_CONN
web      Running  1/1      100.00%   2.0rps   1ms           4ms           9ms           3
voting   Running  1/1       83.33%   1.0rps   1ms           2ms           2ms           2
";

#[test]
fn test_stat_output_from_binary() {
    init_test_logging();
    crate::test_log!("TEST START: test_stat_output_from_binary");

    let binary = FakeBinary::new(&format!(
        r#"case "$*" in
  *--short*) echo v1; exit 0 ;;
esac
printf '%s' '{STAT_OUTPUT}'"#
    ));
    let harness = ControlPlaneHarness::new(binary.config()).unwrap();

    let out = harness.run(["stat", "deploy", "-n", "emojivoto"]).into_stdout().unwrap();
    let rows = parse_rows(&out, 2, 9).unwrap();

    assert_eq!(rows["web"].status.as_deref(), Some("Running"));
    assert_eq!(rows["web"].tcp_open_connections, "3");
    assert_eq!(rows["voting"].success, "83.33%");

    let err = parse_rows(&out, 3, 9).unwrap_err();
    assert!(matches!(err, HarnessError::RowCount { expected: 3, actual: 2, .. }));

    crate::test_log!("TEST PASS: test_stat_output_from_binary");
}

/// Fails like an unreachable API server until `ready_after` calls have been made.
struct ScriptedEvents {
    calls: Cell<usize>,
    ready_after: usize,
}

impl KubeApi for ScriptedEvents {
    fn events_json(&self, namespace: &str) -> HarnessResult<String> {
        self.calls.set(self.calls.get() + 1);
        if self.calls.get() < self.ready_after {
            return Err(HarnessError::CommandFailed {
                program: "kubectl".to_string(),
                status: "exit code 1".to_string(),
                stderr: "connection refused".to_string(),
            });
        }
        Ok(json!({
            "kind": "EventList",
            "items": [{
                "metadata": { "name": "web.1", "namespace": namespace },
                "involvedObject": { "kind": "Pod", "name": "web-7d9f", "namespace": namespace },
                "reason": "Unhealthy",
                "message": "Readiness probe failed",
                "type": "Warning",
                "count": 2,
                "lastTimestamp": "2020-10-16T12:00:00Z"
            }]
        })
        .to_string())
    }
}

#[test]
fn test_events_through_kube_api() {
    init_test_logging();

    let binary = FakeBinary::control_plane("v1", "v1");
    let harness = ControlPlaneHarness::new(binary.config()).unwrap();
    let api = ScriptedEvents {
        calls: Cell::new(0),
        ready_after: 1,
    };

    let events = harness.events(&api, "emojivoto").unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_warning());
    assert_eq!(events[0].involved_object.namespace, "emojivoto");
    assert_eq!(events[0].count, 2);
}

#[test]
fn test_poll_until_events_appear() {
    init_test_logging();

    let binary = FakeBinary::control_plane("v1", "v1");
    let mut config = binary.config();
    config.poll_interval = Duration::from_millis(20);
    let harness = ControlPlaneHarness::new(config).unwrap();
    let api = ScriptedEvents {
        calls: Cell::new(0),
        ready_after: 3,
    };

    let events = harness
        .retry_for(Duration::from_secs(5), || harness.events(&api, "emojivoto"))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(api.calls.get(), 3);

    let api = ScriptedEvents {
        calls: Cell::new(0),
        ready_after: usize::MAX,
    };
    let err = harness
        .retry_for(Duration::from_millis(100), || harness.events(&api, "emojivoto"))
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, HarnessError::CommandFailed { .. }));
}

#[test]
fn test_empty_event_list_is_shape_mismatch() {
    init_test_logging();

    struct NoEvents;
    impl KubeApi for NoEvents {
        fn events_json(&self, _namespace: &str) -> HarnessResult<String> {
            Ok(json!({ "kind": "EventList", "items": [] }).to_string())
        }
    }

    let binary = FakeBinary::control_plane("v1", "v1");
    let harness = ControlPlaneHarness::new(binary.config()).unwrap();
    let err = harness.events(&NoEvents, "emojivoto").unwrap_err();
    assert!(matches!(err, HarnessError::NoEvents));
    assert!(!err.is_retryable());
}
