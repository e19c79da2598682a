//! Analysis configuration from environment variables (and CLI overrides)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::WorkerError;

/// Time and/or depth bound for one engine search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SearchLimits {
    pub time: Option<Duration>,
    pub depth: Option<u32>,
}

impl SearchLimits {
    pub fn new(time: Option<Duration>, depth: Option<u32>) -> Self {
        Self { time, depth }
    }

    pub fn is_bounded(&self) -> bool {
        self.time.is_some_and(|t| !t.is_zero()) || self.depth.is_some_and(|d| d > 0)
    }

    /// Longest we wait for `bestmove` before declaring the engine hung.
    ///
    /// A depth-only search has no time component, so its whole budget is
    /// the grace period. Raise `ENGINE_GRACE_MS` for deep depth-only
    /// searches or they will be treated as hangs and the engine restarted.
    pub fn deadline(&self, grace: Duration) -> Duration {
        self.time.unwrap_or(Duration::ZERO) + grace
    }
}

/// Whose point of view a score is compared against the threshold from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePerspective {
    /// The side to move in the position after the move (engine-native).
    #[default]
    SideToMove,
    /// The player who just made the move.
    Mover,
}

impl FromStr for ScorePerspective {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "side-to-move" | "side_to_move" | "stm" => Ok(Self::SideToMove),
            "mover" => Ok(Self::Mover),
            other => Err(WorkerError::Config(format!(
                "unknown score perspective {other:?} (expected side-to-move or mover)"
            ))),
        }
    }
}

impl fmt::Display for ScorePerspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SideToMove => f.write_str("side-to-move"),
            Self::Mover => f.write_str("mover"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// Path to the UCI engine binary
    pub path: PathBuf,

    pub threads: u32,

    /// Transposition table size
    pub hash_mb: u32,

    /// Bound on spawn + `uci`/`isready` handshake
    pub handshake_timeout: Duration,

    /// Extra time allowed past a request's own limit. Also the entire
    /// budget of a depth-only request, see [`SearchLimits::deadline`].
    pub grace_period: Duration,

    /// How long `quit` may take before the process is killed
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockfish"),
            threads: 1,
            hash_mb: 256,
            handshake_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisConfig {
    pub engine: EngineConfig,

    /// Limits for the per-move evaluation
    pub evaluation: SearchLimits,

    /// Limits for the multi-PV lookup made on a blunder
    pub alternatives: SearchLimits,

    /// Scores at or below this (centipawns) are blunders
    pub blunder_threshold: i32,

    /// Number of alternative moves to report per blunder
    pub alternatives_count: usize,

    pub perspective: ScorePerspective,

    /// Engine processes to run in parallel (0 = one per CPU)
    pub workers: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            evaluation: SearchLimits::new(Some(Duration::from_millis(500)), None),
            alternatives: SearchLimits::new(Some(Duration::from_millis(500)), Some(20)),
            blunder_threshold: -500,
            alternatives_count: 5,
            perspective: ScorePerspective::SideToMove,
            workers: 1,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("ENGINE_PATH") {
            config.engine.path = PathBuf::from(path);
        }
        if let Some(threads) = parse_var(&var, "ENGINE_THREADS")? {
            config.engine.threads = threads;
        }
        if let Some(hash) = parse_var(&var, "ENGINE_HASH_MB")? {
            config.engine.hash_mb = hash;
        }
        if let Some(ms) = parse_var(&var, "ENGINE_HANDSHAKE_TIMEOUT_MS")? {
            config.engine.handshake_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&var, "ENGINE_GRACE_MS")? {
            config.engine.grace_period = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&var, "ENGINE_SHUTDOWN_MS")? {
            config.engine.shutdown_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_var(&var, "EVAL_TIME_MS")? {
            config.evaluation.time = Some(Duration::from_millis(ms));
        }
        if let Some(depth) = parse_var(&var, "EVAL_DEPTH")? {
            config.evaluation.depth = Some(depth);
        }
        if let Some(ms) = parse_var(&var, "ALT_TIME_MS")? {
            config.alternatives.time = Some(Duration::from_millis(ms));
        }
        if let Some(depth) = parse_var(&var, "ALT_DEPTH")? {
            config.alternatives.depth = Some(depth);
        }

        if let Some(threshold) = parse_var(&var, "BLUNDER_THRESHOLD")? {
            config.blunder_threshold = threshold;
        }
        if let Some(count) = parse_var(&var, "ALTERNATIVES")? {
            config.alternatives_count = count;
        }
        if let Some(perspective) = var("SCORE_PERSPECTIVE") {
            config.perspective = perspective.parse()?;
        }
        if let Some(workers) = parse_var(&var, "WORKERS")? {
            config.workers = workers;
        }

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.engine.path.as_os_str().is_empty() {
            return Err(WorkerError::Config("engine path is empty".into()));
        }
        if self.alternatives_count == 0 {
            return Err(WorkerError::Config(
                "alternatives count must be at least 1".into(),
            ));
        }
        if !self.evaluation.is_bounded() {
            return Err(WorkerError::Config(
                "evaluation needs a time or depth limit".into(),
            ));
        }
        if !self.alternatives.is_bounded() {
            return Err(WorkerError::Config(
                "alternatives lookup needs a time or depth limit".into(),
            ));
        }
        if self.engine.handshake_timeout.is_zero()
            || self.engine.grace_period.is_zero()
            || self.engine.shutdown_timeout.is_zero()
        {
            return Err(WorkerError::Config("engine timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Worker count with `0` resolved to the number of CPUs.
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>, WorkerError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WorkerError::Config(format!("{name} has invalid value {raw:?}"))),
        None => Ok(None),
    }
}
