//! Blunder worker
//!
//! Reads PGN files, runs every game through a pool of UCI engines and
//! writes the blunder report as JSON.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use blunder_worker::{AnalysisConfig, Analyzer, ScorePerspective};
use chess_core::Game;

#[derive(Parser, Debug)]
#[command(name = "blunder-worker")]
#[command(version, about = "Find blunders in PGN games with a UCI engine")]
struct Args {
    /// PGN files, or directories searched for *.pgn
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Engine binary (overrides ENGINE_PATH)
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Per-move evaluation time in milliseconds
    #[arg(long)]
    time_ms: Option<u64>,

    /// Per-move evaluation depth
    #[arg(long)]
    depth: Option<u32>,

    /// Alternatives search time in milliseconds
    #[arg(long)]
    alt_time_ms: Option<u64>,

    /// Alternatives search depth
    #[arg(long)]
    alt_depth: Option<u32>,

    /// Centipawn score at or below which a move is a blunder
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<i32>,

    /// Alternative moves reported per blunder
    #[arg(long)]
    alternatives: Option<usize>,

    #[arg(long, value_enum)]
    perspective: Option<ScorePerspective>,

    /// Engine processes to run in parallel (0 = one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(engine) = &self.engine {
            config.engine.path = engine.clone();
        }
        if let Some(ms) = self.time_ms {
            config.evaluation.time = Some(Duration::from_millis(ms));
        }
        if let Some(depth) = self.depth {
            config.evaluation.depth = Some(depth);
        }
        if let Some(ms) = self.alt_time_ms {
            config.alternatives.time = Some(Duration::from_millis(ms));
        }
        if let Some(depth) = self.alt_depth {
            config.alternatives.depth = Some(depth);
        }
        if let Some(threshold) = self.threshold {
            config.blunder_threshold = threshold;
        }
        if let Some(count) = self.alternatives {
            config.alternatives_count = count;
        }
        if let Some(perspective) = self.perspective {
            config.perspective = perspective;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}

/// Expand directories into their `*.pgn` files, sorted by name.
fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let pattern = input.join("*.pgn");
            let pattern = pattern.to_string_lossy();
            let mut found: Vec<PathBuf> = glob::glob(&pattern)
                .with_context(|| format!("bad input directory {}", input.display()))?
                .filter_map(Result::ok)
                .collect();
            found.sort();
            if found.is_empty() {
                warn!(dir = %input.display(), "No PGN files in directory");
            }
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn load_games(path: &Path) -> anyhow::Result<Vec<Game>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let games = chess_core::pgn::read_games(BufReader::new(file))
        .with_context(|| format!("cannot read PGN from {}", path.display()))?;
    info!(file = %path.display(), games = games.len(), "Loaded PGN");
    Ok(games)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries the report
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let mut config = AnalysisConfig::from_env()?;
    args.apply(&mut config);

    info!(
        engine = %config.engine.path.display(),
        threshold = config.blunder_threshold,
        alternatives = config.alternatives_count,
        perspective = %config.perspective,
        workers = config.effective_workers(),
        "Config loaded"
    );

    let mut games = Vec::new();
    for path in collect_inputs(&args.inputs)? {
        games.extend(load_games(&path)?);
    }

    let report = Analyzer::new(config).run(&games).await?;

    match &args.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
            out.flush()?;
            info!(file = %path.display(), "Report written");
        }
        None => {
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
    }

    for failed in report.failed_games() {
        warn!(
            event = %failed.event,
            error = failed.error.as_deref().unwrap_or_default(),
            "Game not fully analyzed"
        );
    }

    Ok(())
}
