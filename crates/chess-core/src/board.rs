//! Board abstraction used by the analysis pipeline, backed by shakmaty.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;

use crate::game_data::Game;

/// Errors raised while replaying a game on a board.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IllegalMove {
    #[error("Illegal move {notation:?} at ply {ply}")]
    Move { ply: usize, notation: String },

    #[error("Invalid setup position: {0}")]
    InvalidSetup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// A mutable position that moves are applied to in order.
///
/// Moves come in as SAN (or UCI long algebraic) and go out as UCI, which
/// is also what engines speak.
pub trait Board {
    /// Apply a move, returning it in UCI notation.
    fn apply_move(&mut self, notation: &str) -> Result<String, IllegalMove>;

    /// Whether a UCI move is legal in the current position.
    fn is_legal(&self, uci: &str) -> bool;

    /// All legal moves in UCI notation.
    fn legal_moves(&self) -> Vec<String>;

    /// Canonical position encoding (FEN).
    fn fingerprint(&self) -> String;

    fn side_to_move(&self) -> Side;

    fn is_game_over(&self) -> bool;
}

/// [`Board`] implementation over a standard-chess shakmaty position.
#[derive(Debug, Clone, Default)]
pub struct ChessBoard {
    pos: Chess,
    ply: usize,
}

impl ChessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, IllegalMove> {
        let setup: Fen = fen
            .parse()
            .map_err(|e| IllegalMove::InvalidSetup(format!("{fen}: {e}")))?;
        let pos: Chess = setup
            .into_position(CastlingMode::Standard)
            .map_err(|e| IllegalMove::InvalidSetup(format!("{fen}: {e}")))?;
        Ok(Self { pos, ply: 0 })
    }

    /// Starting board for a game, honouring a `SetUp`/`FEN` header.
    pub fn for_game(game: &Game) -> Result<Self, IllegalMove> {
        match game.starting_fen() {
            Some(fen) => Self::from_fen(fen),
            None => Ok(Self::new()),
        }
    }

    /// Number of moves applied so far.
    pub fn ply(&self) -> usize {
        self.ply
    }

    fn parse_move(&self, notation: &str) -> Option<Move> {
        let notation = notation.trim();
        if let Ok(san) = notation.parse::<SanPlus>() {
            if let Ok(mv) = san.san.to_move(&self.pos) {
                return Some(mv);
            }
        }
        parse_uci(&self.pos, notation)
    }
}

fn parse_uci(pos: &Chess, uci: &str) -> Option<Move> {
    let uci: UciMove = uci.parse().ok()?;
    uci.to_move(pos).ok()
}

impl Board for ChessBoard {
    fn apply_move(&mut self, notation: &str) -> Result<String, IllegalMove> {
        let mv = self.parse_move(notation).ok_or_else(|| IllegalMove::Move {
            ply: self.ply + 1,
            notation: notation.to_string(),
        })?;

        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        self.pos.play_unchecked(mv);
        self.ply += 1;
        Ok(uci)
    }

    fn is_legal(&self, uci: &str) -> bool {
        parse_uci(&self.pos, uci).is_some()
    }

    fn legal_moves(&self) -> Vec<String> {
        self.pos
            .legal_moves()
            .iter()
            .map(|mv| mv.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    fn fingerprint(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Legal).to_string()
    }

    fn side_to_move(&self) -> Side {
        self.pos.turn().into()
    }

    fn is_game_over(&self) -> bool {
        self.pos.is_game_over()
    }
}
