use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_EVENT: &str = "Unknown Event";
pub const UNKNOWN_PLAYER: &str = "Unknown";

/// A decoded game: every PGN header plus the mainline moves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub headers: BTreeMap<String, String>,
    pub moves: Vec<String>, // SAN notation
}

impl Game {
    pub fn new(headers: BTreeMap<String, String>, moves: Vec<String>) -> Self {
        Self { headers, moves }
    }

    /// Build a game from `(name, value)` header pairs and SAN moves.
    pub fn from_parts<H, K, V, M>(headers: H, moves: M) -> Self
    where
        H: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            moves: moves.into_iter().map(Into::into).collect(),
        }
    }

    /// Header value, `None` when missing or empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn event(&self) -> &str {
        self.header("Event").unwrap_or(UNKNOWN_EVENT)
    }

    pub fn white(&self) -> &str {
        self.header("White").unwrap_or(UNKNOWN_PLAYER)
    }

    pub fn black(&self) -> &str {
        self.header("Black").unwrap_or(UNKNOWN_PLAYER)
    }

    /// Custom starting position, only honoured when `SetUp` is "1".
    pub fn starting_fen(&self) -> Option<&str> {
        match self.header("SetUp") {
            Some("1") => self.header("FEN"),
            _ => None,
        }
    }
}
