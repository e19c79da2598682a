//! Evaluation types, the engine seam, and the single-line position evaluator

use std::fmt;

use chess_core::Board;
use serde::{Deserialize, Serialize};

use crate::config::SearchLimits;
use crate::error::EngineError;

/// Engine score, always from the side to move's point of view.
///
/// Centipawns: positive = side to move is better.
/// Mate: positive N = side to move mates in N, negative = gets mated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

impl Score {
    /// Centipawn value, `None` for mate scores (never compare those numerically).
    pub fn centipawns(&self) -> Option<i32> {
        match self {
            Self::Centipawns(cp) => Some(*cp),
            Self::Mate(_) => None,
        }
    }

    /// Same score seen from the other side.
    ///
    /// Saturates, so an engine reporting `i32::MIN` gives `i32::MAX`.
    pub fn negate(&self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(cp.saturating_neg()),
            Self::Mate(m) => Self::Mate(m.saturating_neg()),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) if *m >= 0 => write!(f, "#{m}"),
            Self::Mate(m) => write!(f, "#-{}", m.abs()),
        }
    }
}

/// A single request to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    pub fingerprint: String,
    pub limits: SearchLimits,
    /// 1 for single-best, N for multi-PV
    pub lines: usize,
}

impl EvaluationRequest {
    pub fn new(fingerprint: impl Into<String>, limits: SearchLimits, lines: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            limits,
            lines: lines.max(1),
        }
    }
}

/// A ranked candidate line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvLine {
    pub rank: usize,
    pub score: Score,
    pub moves: Vec<String>,
}

impl PvLine {
    pub fn first_move(&self) -> Option<&str> {
        self.moves.first().map(String::as_str)
    }
}

/// Parsed engine answer: score of the best line plus every line, best first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub score: Score,
    pub lines: Vec<PvLine>,
    pub best_move: Option<String>,
}

/// Anything that can answer evaluation requests one at a time.
///
/// [`crate::engine::EngineChannel`] is the real implementation; the seam
/// exists so the detector can be driven by scripted engines in tests.
#[allow(async_fn_in_trait)]
pub trait Engine {
    async fn analyse(&mut self, request: &EvaluationRequest)
        -> Result<EvaluationResult, EngineError>;

    /// Replace a hung or dead process with a fresh one.
    async fn restart(&mut self) -> Result<(), EngineError>;

    /// Mark the start of a new game (clears engine-side search state).
    async fn new_game(&mut self) -> Result<(), EngineError>;
}

/// Single-best-line evaluation of the board's current position.
pub async fn evaluate<E, B>(
    engine: &mut E,
    board: &B,
    limits: &SearchLimits,
) -> Result<EvaluationResult, EngineError>
where
    E: Engine,
    B: Board,
{
    let request = EvaluationRequest::new(board.fingerprint(), *limits, 1);
    engine.analyse(&request).await
}
