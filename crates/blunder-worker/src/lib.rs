//! Blunder detection over PGN games using an external UCI engine.

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod pipeline;
pub mod report;
pub mod uci;
pub mod variations;

#[cfg(test)]
mod testing;

pub use config::{AnalysisConfig, EngineConfig, ScorePerspective, SearchLimits};
pub use engine::EngineChannel;
pub use error::{EngineError, WorkerError};
pub use evaluation::{Engine, EvaluationRequest, EvaluationResult, PvLine, Score};
pub use pipeline::Analyzer;
pub use report::{BlunderRecord, GameResult, Report};
