//! Variation finder: top-K candidate moves from a multi-PV search.

use chess_core::Board;
use tracing::debug;

use crate::config::SearchLimits;
use crate::error::EngineError;
use crate::evaluation::{Engine, EvaluationRequest};

/// Best-first candidate moves for the board's position, at most `k` of them.
///
/// The engine is advisory: a first move the board rejects (stale or
/// garbled line) is dropped, as is a repeat of a move already listed.
pub async fn find_alternatives<E, B>(
    engine: &mut E,
    board: &B,
    limits: &SearchLimits,
    k: usize,
) -> Result<Vec<String>, EngineError>
where
    E: Engine,
    B: Board,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let request = EvaluationRequest::new(board.fingerprint(), *limits, k);
    let result = engine.analyse(&request).await?;

    let mut moves: Vec<String> = Vec::with_capacity(k);
    for line in &result.lines {
        let Some(mv) = line.first_move() else {
            continue;
        };
        if !board.is_legal(mv) {
            debug!(mv, rank = line.rank, fen = %request.fingerprint, "Engine output rejected: illegal alternative");
            continue;
        }
        if moves.iter().any(|m| m == mv) {
            continue;
        }
        moves.push(mv.to_string());
        if moves.len() == k {
            break;
        }
    }

    Ok(moves)
}
