use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use meshprobe::HarnessConfig;
use tempfile::TempDir;

/// A shell script standing in for the control-plane CLI.
///
/// Every invocation appends its arguments to `args.log` next to the script,
/// one line per call.
pub struct FakeBinary {
    pub dir: TempDir,
    pub path: PathBuf,
    pub fixtures: PathBuf,
}

impl FakeBinary {
    /// `body` runs after the arguments were logged; `$@` holds them.
    pub fn new(body: &str) -> Self {
        crate::test_log!("FIXTURE: Creating fake control-plane binary");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("ctl");
        let log = dir.path().join("args.log");
        let fixtures = dir.path().join("testdata");
        fs::create_dir_all(&fixtures).expect("Failed to create fixture dir");

        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\n{body}\n",
            log.display()
        );
        fs::write(&path, script).expect("Failed to write fake binary");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to mark fake binary executable");

        Self {
            dir,
            path,
            fixtures,
        }
    }

    /// A binary that answers `version` like a real client/server pair and
    /// echoes its arguments for anything else.
    pub fn control_plane(client: &str, server: &str) -> Self {
        Self::new(&format!(
            r#"for arg in "$@"; do
  case "$arg" in
    --short) echo "{client}"; exit 0 ;;
  esac
done
for arg in "$@"; do
  case "$arg" in
    version) printf 'Client version: {client}\nServer version: {server}\n'; exit 0 ;;
  esac
done
echo "$@""#
        ))
    }

    /// Harness config pointing at this binary and its fixture dir.
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::for_binary(&self.path);
        config.fixture_dir = self.fixtures.clone();
        config
    }

    pub fn write_fixture(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.fixtures.join(name);
        fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    /// Argument lines of every invocation so far.
    pub fn invocations(&self) -> Vec<String> {
        read_lines(&self.dir.path().join("args.log"))
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
