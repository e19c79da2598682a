//! Result records and the report aggregator.

use chess_core::{Game, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A move whose evaluation fell to or below the blunder threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlunderRecord {
    /// Position right after the move
    pub fen: String,
    #[serde(rename = "move")]
    pub move_uci: String,
    /// 1-based half-move number
    pub ply: usize,
    /// Player who made the move
    pub side: Side,
    /// Centipawns, from the configured perspective
    pub score: i32,
    /// Engine candidates in that position, best first
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub event: String,
    pub white: String,
    pub black: String,
    pub blunders: Vec<BlunderRecord>,
    /// Set when the game could not be analysed (e.g. an illegal move)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GameResult {
    /// Empty result carrying the game's identifying headers.
    pub fn for_game(game: &Game) -> Self {
        Self {
            event: game.event().to_string(),
            white: game.white().to_string(),
            black: game.black().to_string(),
            blunders: Vec::new(),
            error: None,
        }
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Output of one analysis run, one entry per input game in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub games: Vec<GameResult>,
}

impl Report {
    pub fn total_blunders(&self) -> usize {
        self.games.iter().map(|g| g.blunders.len()).sum()
    }

    pub fn failed_games(&self) -> impl Iterator<Item = &GameResult> {
        self.games.iter().filter(|g| g.is_failed())
    }
}

/// Collects per-game results, possibly out of order, into input order.
pub struct ReportAggregator {
    slots: Vec<Option<GameResult>>,
    placeholders: Vec<GameResult>,
}

impl ReportAggregator {
    pub fn new(games: &[Game]) -> Self {
        Self {
            slots: vec![None; games.len()],
            placeholders: games.iter().map(GameResult::for_game).collect(),
        }
    }

    /// Store the result for the game at `index` of the input.
    pub fn record(&mut self, index: usize, result: GameResult) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    pub fn finish(self) -> Report {
        let games = self
            .slots
            .into_iter()
            .zip(self.placeholders)
            .map(|(slot, placeholder)| {
                slot.unwrap_or_else(|| placeholder.failed("game was not analysed"))
            })
            .collect();

        Report {
            generated_at: Utc::now(),
            games,
        }
    }
}
