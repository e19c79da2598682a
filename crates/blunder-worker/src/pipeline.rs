//! Analysis pipeline: a pool of engine processes working through a batch of games.

use std::iter::Enumerate;
use std::slice;
use std::time::Instant;

use chess_core::Game;
use futures::future::{join_all, try_join_all};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, EngineConfig};
use crate::detector::analyze_game;
use crate::engine::EngineChannel;
use crate::error::{EngineError, WorkerError};
use crate::evaluation::Engine;
use crate::report::{Report, ReportAggregator};

type GameQueue<'a> = Mutex<Enumerate<slice::Iter<'a, Game>>>;

pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyse every game and return one result per game, in input order.
    ///
    /// Engine processes are started here and always shut down before
    /// returning, whether the run succeeded or not.
    pub async fn run(&self, games: &[Game]) -> Result<Report, WorkerError> {
        self.config.validate()?;

        if games.is_empty() {
            info!("No games to analyze");
            return Ok(ReportAggregator::new(games).finish());
        }

        let workers = self.config.effective_workers().min(games.len());
        info!(
            games = games.len(),
            workers,
            engine = %self.config.engine.path.display(),
            "Starting analysis"
        );

        let started = Instant::now();
        let mut channels = open_channels(&self.config.engine, workers).await?;
        let outcome = analyze_games(&mut channels, games, &self.config).await;
        close_all(channels).await;

        let report = outcome?;
        info!(
            games = report.games.len(),
            blunders = report.total_blunders(),
            failed = report.failed_games().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(report)
    }
}

/// Run `games` across the given engines, one worker per engine.
///
/// Workers pull the next game from a shared queue, so a slow game never
/// holds up the others. The first fatal engine error stops the batch.
pub async fn analyze_games<E: Engine>(
    engines: &mut [E],
    games: &[Game],
    config: &AnalysisConfig,
) -> Result<Report, EngineError> {
    let queue: GameQueue<'_> = Mutex::new(games.iter().enumerate());
    let results = Mutex::new(ReportAggregator::new(games));
    let total = games.len();

    let workers = engines
        .iter_mut()
        .enumerate()
        .map(|(id, engine)| worker(id, engine, &queue, &results, total, config));
    try_join_all(workers).await?;

    Ok(results.into_inner().finish())
}

async fn worker<E: Engine>(
    id: usize,
    engine: &mut E,
    queue: &GameQueue<'_>,
    results: &Mutex<ReportAggregator>,
    total: usize,
    config: &AnalysisConfig,
) -> Result<(), EngineError> {
    let mut analyzed = 0usize;
    loop {
        let next = queue.lock().await.next();
        let Some((index, game)) = next else {
            break;
        };

        debug!(worker = id, game = index + 1, total, "Picked up game");
        let result = analyze_game(engine, game, config).await?;
        results.lock().await.record(index, result);
        analyzed += 1;
    }
    debug!(worker = id, analyzed, "Worker finished");
    Ok(())
}

/// Start `count` engines, shutting down the ones already running if any fails.
async fn open_channels(
    config: &EngineConfig,
    count: usize,
) -> Result<Vec<EngineChannel>, EngineError> {
    let mut channels = Vec::with_capacity(count);
    for _ in 0..count {
        match EngineChannel::open(config).await {
            Ok(channel) => channels.push(channel),
            Err(e) => {
                close_all(channels).await;
                return Err(e);
            }
        }
    }
    Ok(channels)
}

async fn close_all(channels: Vec<EngineChannel>) {
    let closed = join_all(channels.into_iter().map(EngineChannel::close)).await;
    for result in closed {
        if let Err(e) = result {
            warn!(error = %e, "Engine did not shut down cleanly");
        }
    }
}
