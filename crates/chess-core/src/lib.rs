//! Chess collaborators for the blunder pipeline: game records, the PGN
//! source and the board abstraction.

pub mod board;
pub mod game_data;
pub mod pgn;

pub use board::{Board, ChessBoard, IllegalMove, Side};
pub use game_data::Game;
