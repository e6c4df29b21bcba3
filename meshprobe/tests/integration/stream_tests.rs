use std::time::Duration;

use meshprobe::{ControlPlaneHarness, ErrorClass, HarnessError, StreamState};

use crate::common::{FakeBinary, init_test_logging};

#[test]
fn test_run_stream_reads_while_running() {
    init_test_logging();
    crate::test_log!("TEST START: test_run_stream_reads_while_running");

    let binary = FakeBinary::new(
        r#"case "$*" in
  *--short*) echo v1; exit 0 ;;
esac
i=0
while true; do
  i=$((i+1))
  echo "req id=$i"
  sleep 0.1
done"#,
    );
    let mut config = binary.config();
    config.stream_grace = Duration::from_millis(200);
    let harness = ControlPlaneHarness::new(config).unwrap();

    let mut stream = harness.run_stream(["tap", "deploy/web"]).unwrap();
    let lines: Vec<String> = stream
        .lines()
        .take(3)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(lines, vec!["req id=1", "req id=2", "req id=3"]);
    assert!(stream.is_running());

    stream.stop().unwrap();
    assert_eq!(stream.state(), StreamState::Closed);

    let calls = binary.invocations();
    assert_eq!(
        calls.last().map(String::as_str),
        Some("--linkerd-namespace linkerd --context= tap deploy/web")
    );

    crate::test_log!("TEST PASS: test_run_stream_reads_while_running");
}

#[test]
fn test_run_stream_early_exit() {
    init_test_logging();

    let binary = FakeBinary::new(
        r#"case "$*" in
  *--short*) echo v1; exit 0 ;;
esac
echo "Error: unknown command" >&2
exit 1"#,
    );
    let mut config = binary.config();
    config.stream_grace = Duration::from_millis(300);
    let harness = ControlPlaneHarness::new(config).unwrap();

    let err = harness.run_stream(["tap"]).unwrap_err();
    assert!(matches!(err, HarnessError::ExitedEarly { .. }));
    assert_eq!(err.class(), ErrorClass::Startup);
}
