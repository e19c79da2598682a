//! Fake UCI engine for integration tests.
//!
//! Each engine is a small `/bin/sh` script in its own temp directory. It
//! answers the handshake, logs every command it receives to `commands.log`
//! and runs a per-test snippet on `go`. The snippet sees `$pos` (last
//! `position` command), `$multipv`, `$searches` (count of `go` so far) and
//! `$dir`.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use blunder_worker::{AnalysisConfig, EngineConfig, SearchLimits};
use tempfile::TempDir;

/// Position after 1.e4 as it appears in a `position fen` command.
pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

/// Scores the position after 1.e4 at -600 for black, everything else at +0.25.
/// With MultiPV above 1 the blunder position gets three candidate lines.
pub const BLUNDER_AFTER_E4: &str = r#"
case "$pos" in
  *"4P3/8/PPPP1PPP/RNBQKBNR b"*)
    if [ "$multipv" -gt 1 ]; then
      echo "info depth 18 seldepth 22 multipv 1 score cp -550 nodes 1000 pv e7e5 g1f3"
      echo "info depth 18 seldepth 22 multipv 2 score cp -560 nodes 1000 pv d7d5"
      echo "info depth 18 seldepth 22 multipv 3 score cp -570 nodes 1000 pv g8f6"
    else
      echo "info depth 18 score cp -500 lowerbound pv e7e5"
      echo "info depth 18 seldepth 22 multipv 1 score cp -600 nodes 1000 pv e7e5"
    fi
    echo "bestmove e7e5"
    ;;
  *)
    echo "info string evaluating"
    echo "info depth 12 multipv 1 score cp 25 wdl 400 400 200 nodes 500 pv a7a6"
    echo "bestmove a7a6"
    ;;
esac
"#;

/// Never answers `go`.
pub const HANG: &str = ":";

/// Dies on the first search of the whole test, answers normally afterwards.
pub const CRASH_ONCE: &str = r#"
if [ ! -f "$dir/crashed" ]; then
  touch "$dir/crashed"
  exit 1
fi
echo "info depth 12 multipv 1 score cp -600 pv e7e5"
echo "bestmove e7e5"
"#;

pub struct FakeEngine {
    dir: TempDir,
    path: PathBuf,
}

impl FakeEngine {
    /// Engine that handles the handshake and runs `on_go` for every search.
    pub fn new(on_go: &str) -> Self {
        Self::with_startup("", on_go)
    }

    /// Like [`FakeEngine::new`], with `startup` run before the handshake
    /// of every process launched.
    pub fn with_startup(startup: &str, on_go: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let log = dir.path().join("commands.log");
        let script = format!(
            r#"#!/bin/sh
dir="{dir}"
log="{log}"
{startup}
multipv=1
searches=0
pos=""
while IFS= read -r line; do
  echo "$line" >> "$log"
  case "$line" in
    uci)
      echo "id name FakeFish 1.0"
      echo "id author Tests"
      echo "option name MultiPV type spin default 1 min 1 max 500"
      echo "uciok"
      ;;
    isready) echo "readyok" ;;
    "setoption name MultiPV value "*) multipv="${{line##* }}" ;;
    "position "*) pos="$line" ;;
    go*)
      searches=$((searches + 1))
      {on_go}
      ;;
    quit) exit 0 ;;
  esac
done
"#,
            dir = dir.path().display(),
            log = log.display(),
            startup = startup,
            on_go = on_go,
        );
        Self::with_script(dir, &script)
    }

    /// Engine whose whole script is `body`.
    pub fn raw(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        Self::with_script(dir, &format!("#!/bin/sh\n{body}\n"))
    }

    fn with_script(dir: TempDir, script: &str) -> Self {
        let path = dir.path().join("fake-engine.sh");
        fs::write(&path, script).expect("write engine script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod engine script");
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Every command received so far, across all processes of this engine.
    pub fn commands(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("commands.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            path: self.path.clone(),
            threads: 1,
            hash_mb: 16,
            handshake_timeout: Duration::from_secs(5),
            grace_period: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
        }
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            engine: self.engine_config(),
            evaluation: SearchLimits::new(Some(Duration::from_millis(10)), None),
            alternatives: SearchLimits::new(Some(Duration::from_millis(10)), Some(5)),
            alternatives_count: 3,
            workers: 1,
            ..AnalysisConfig::default()
        }
    }
}

/// Quick search limits for direct channel requests.
pub fn fast() -> SearchLimits {
    SearchLimits::new(Some(Duration::from_millis(10)), None)
}
