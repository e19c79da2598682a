//! Blunder detector: replays a game move by move and flags every move
//! after which the position scores at or below the threshold.

use chess_core::{Board, ChessBoard, Game};
use tracing::{debug, error, info, warn};

use crate::config::{AnalysisConfig, ScorePerspective};
use crate::error::EngineError;
use crate::evaluation::{evaluate, Engine, Score};
use crate::report::{BlunderRecord, GameResult};
use crate::variations::find_alternatives;

/// Whether a comparable score counts as a blunder.
pub fn is_blunder(score: i32, threshold: i32) -> bool {
    score <= threshold
}

/// The number compared against the threshold, or `None` for mate scores.
///
/// Engine scores are relative to the side to move after the move, which is
/// the mover's opponent.
pub fn comparable_score(score: Score, perspective: ScorePerspective) -> Option<i32> {
    match perspective {
        ScorePerspective::SideToMove => score.centipawns(),
        ScorePerspective::Mover => score.negate().centipawns(),
    }
}

/// Analyse one game from its starting position.
///
/// A game that cannot be replayed comes back as a [`GameResult`] with
/// `error` set and whatever blunders were found before the bad move.
/// `Err` is reserved for failures that end the whole run, i.e. an engine
/// that cannot be restarted.
pub async fn analyze_game<E: Engine>(
    engine: &mut E,
    game: &Game,
    config: &AnalysisConfig,
) -> Result<GameResult, EngineError> {
    match ChessBoard::for_game(game) {
        Ok(board) => analyze_game_on(engine, game, board, config).await,
        Err(e) => {
            error!(event = game.event(), error = %e, "Cannot set up game");
            Ok(GameResult::for_game(game).failed(e.to_string()))
        }
    }
}

/// Analyse a game's moves on an already set-up board.
pub async fn analyze_game_on<E, B>(
    engine: &mut E,
    game: &Game,
    mut board: B,
    config: &AnalysisConfig,
) -> Result<GameResult, EngineError>
where
    E: Engine,
    B: Board,
{
    let mut result = GameResult::for_game(game);
    info!(
        event = %result.event,
        white = %result.white,
        black = %result.black,
        moves = game.moves.len(),
        "Analyzing game"
    );

    if let Err(e) = engine.new_game().await {
        recover(engine, &e).await?;
    }

    for (index, notation) in game.moves.iter().enumerate() {
        let ply = index + 1;
        let mover = board.side_to_move();

        let uci = match board.apply_move(notation) {
            Ok(uci) => uci,
            Err(e) => {
                error!(event = %result.event, ply, notation = %notation, "Illegal move, abandoning game");
                return Ok(result.failed(e.to_string()));
            }
        };
        let fen = board.fingerprint();

        let evaluation = match evaluate(engine, &board, &config.evaluation).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                recover(engine, &e).await?;
                warn!(ply, mv = %uci, error = %e, "Evaluation failed, skipping position");
                continue;
            }
        };

        let Some(score) = comparable_score(evaluation.score, config.perspective) else {
            debug!(ply, mv = %uci, score = %evaluation.score, "Mate score, not compared");
            continue;
        };
        debug!(ply, mv = %uci, score, "Position evaluated");

        if !is_blunder(score, config.blunder_threshold) {
            continue;
        }

        let alternatives = match find_alternatives(
            engine,
            &board,
            &config.alternatives,
            config.alternatives_count,
        )
        .await
        {
            Ok(moves) => moves,
            Err(e) => {
                recover(engine, &e).await?;
                warn!(ply, mv = %uci, error = %e, "Alternatives lookup failed");
                Vec::new()
            }
        };

        info!(ply, mv = %uci, side = ?mover, score, "Blunder");
        result.blunders.push(BlunderRecord {
            fen,
            move_uci: uci,
            ply,
            side: mover,
            score,
            alternatives,
        });
    }

    info!(
        event = %result.event,
        blunders = result.blunders.len(),
        "Game analyzed"
    );
    Ok(result)
}

/// Put the engine back in a usable state after a failed request.
///
/// A protocol error leaves the channel in sync and needs nothing; anything
/// else gets a fresh process. Only a failed restart is returned.
async fn recover<E: Engine>(engine: &mut E, cause: &EngineError) -> Result<(), EngineError> {
    if !cause.needs_restart() {
        return Ok(());
    }
    engine.restart().await.inspect_err(|e| {
        error!(cause = %cause, error = %e, "Engine restart failed");
    })
}
