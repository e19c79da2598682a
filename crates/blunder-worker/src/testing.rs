//! Scripted in-memory engine for unit tests.

use std::collections::VecDeque;

use crate::error::EngineError;
use crate::evaluation::{Engine, EvaluationRequest, EvaluationResult, PvLine, Score};

type Responder = Box<dyn Fn(&EvaluationRequest) -> EvaluationResult>;

/// Result with a single scored line and no moves.
pub fn score_result(score: Score) -> EvaluationResult {
    lines_result(&[(score, &[])])
}

/// Result with one line per `(score, pv)` entry, ranked in order.
pub fn lines_result(lines: &[(Score, &[&str])]) -> EvaluationResult {
    let lines: Vec<PvLine> = lines
        .iter()
        .enumerate()
        .map(|(i, (score, pv))| PvLine {
            rank: i + 1,
            score: *score,
            moves: pv.iter().map(|m| m.to_string()).collect(),
        })
        .collect();
    EvaluationResult {
        score: lines.first().map(|l| l.score).unwrap_or(Score::Centipawns(0)),
        best_move: lines.first().and_then(|l| l.moves.first().cloned()),
        lines,
    }
}

/// Replays queued replies in order, then falls back to a responder
/// (or a flat 0.00 evaluation).
#[derive(Default)]
pub struct ScriptedEngine {
    replies: VecDeque<Result<EvaluationResult, EngineError>>,
    responder: Option<Responder>,
    requests: Vec<EvaluationRequest>,
    restarts: usize,
    new_games: usize,
    fail_restart: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_score(self, score: Score) -> Self {
        self.push_result(score_result(score))
    }

    pub fn push_result(mut self, result: EvaluationResult) -> Self {
        self.replies.push_back(Ok(result));
        self
    }

    pub fn push_error(mut self, error: EngineError) -> Self {
        self.replies.push_back(Err(error));
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&EvaluationRequest) -> EvaluationResult + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn fail_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    pub fn requests(&self) -> &[EvaluationRequest] {
        &self.requests
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn new_games(&self) -> usize {
        self.new_games
    }
}

impl Engine for ScriptedEngine {
    async fn analyse(
        &mut self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EngineError> {
        self.requests.push(request.clone());
        if let Some(reply) = self.replies.pop_front() {
            return reply;
        }
        Ok(match &self.responder {
            Some(responder) => responder(request),
            None => score_result(Score::Centipawns(0)),
        })
    }

    async fn restart(&mut self) -> Result<(), EngineError> {
        if self.fail_restart {
            return Err(EngineError::StartFailure("scripted restart failure".into()));
        }
        self.restarts += 1;
        Ok(())
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.new_games += 1;
        Ok(())
    }
}
