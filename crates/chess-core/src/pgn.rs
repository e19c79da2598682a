//! PGN source: streams games out of PGN text with pgn-reader.
//!
//! Only the mainline is kept; comments, NAGs and variations are skipped.
//! Moves are recorded as written and are not checked for legality here.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use tracing::debug;

use crate::game_data::Game;

/// Movetext state: headers carried over from the tag section plus moves.
struct GameState {
    headers: BTreeMap<String, String>,
    moves: Vec<String>,
}

/// Visitor that turns each PGN game into a [`Game`].
struct GameCollector;

impl Visitor for GameCollector {
    type Tags = BTreeMap<String, String>;
    type Movetext = GameState;
    type Output = Game;

    fn begin_tags(&mut self) -> ControlFlow<Game, Self::Tags> {
        ControlFlow::Continue(BTreeMap::new())
    }

    fn tag(&mut self, tags: &mut Self::Tags, name: &[u8], value: RawTag<'_>) -> ControlFlow<Game> {
        let name = String::from_utf8_lossy(name).into_owned();
        // First occurrence wins, like most PGN tools
        tags.entry(name)
            .or_insert_with(|| value.decode_utf8_lossy().into_owned());
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Game, GameState> {
        ControlFlow::Continue(GameState {
            headers: tags,
            moves: Vec::new(),
        })
    }

    fn begin_variation(&mut self, _state: &mut GameState) -> ControlFlow<Game, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, state: &mut GameState, san_plus: SanPlus) -> ControlFlow<Game> {
        state.moves.push(san_plus.to_string());
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, state: GameState) -> Game {
        Game::new(state.headers, state.moves)
    }
}

/// Read every game from a PGN stream, in input order.
pub fn read_games<R: Read>(input: R) -> io::Result<Vec<Game>> {
    let mut reader = Reader::new(input);
    let mut collector = GameCollector;
    let mut games = Vec::new();

    while let Some(game) = reader.read_game(&mut collector)? {
        debug!(
            event = game.event(),
            moves = game.moves.len(),
            "Parsed PGN game"
        );
        games.push(game);
    }

    Ok(games)
}

/// Parse PGN text held in memory.
pub fn parse_pgn(pgn: &str) -> io::Result<Vec<Game>> {
    read_games(pgn.as_bytes())
}
