//! UCI line grammar: command formatting and response parsing.
//!
//! Pure functions only, the process plumbing lives in `engine`.

use crate::config::SearchLimits;
use crate::evaluation::Score;

/// One parsed `info` line carrying a score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    /// 1-based multi-PV rank (1 when the engine omits it)
    pub multipv: usize,
    pub depth: Option<u32>,
    pub score: Score,
    pub pv: Vec<String>,
}

/// `go` command for the given limits.
pub fn go_command(limits: &SearchLimits) -> String {
    let mut cmd = String::from("go");
    if let Some(time) = limits.time {
        cmd.push_str(&format!(" movetime {}", time.as_millis().max(1)));
    }
    if let Some(depth) = limits.depth {
        cmd.push_str(&format!(" depth {depth}"));
    }
    if limits.time.is_none() && limits.depth.is_none() {
        // Never send an unbounded search
        cmd.push_str(" depth 1");
    }
    cmd
}

pub fn position_command(fen: &str) -> String {
    format!("position fen {fen}")
}

pub fn multipv_command(lines: usize) -> String {
    format!("setoption name MultiPV value {lines}")
}

/// Parse an `info` line.
///
/// `Ok(None)` means the line carries nothing we use (no score, a bound
/// score, or an `info string`). `Err` means the line is malformed.
pub fn parse_info(line: &str) -> Result<Option<InfoLine>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.first() != Some(&"info") {
        return Err(format!("not an info line: {line:?}"));
    }

    let mut multipv = 1usize;
    let mut depth = None;
    let mut score = None;
    let mut bound = false;
    let mut pv = Vec::new();

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                depth = Some(parse_number(&parts, i + 1, "depth")?);
                i += 2;
            }
            "multipv" => {
                multipv = parse_number(&parts, i + 1, "multipv")?;
                if multipv == 0 {
                    return Err(format!("multipv index 0 in {line:?}"));
                }
                i += 2;
            }
            "score" => {
                let kind = parts.get(i + 1).copied();
                let value: i32 = parse_number(&parts, i + 2, "score")?;
                score = match kind {
                    Some("cp") => Some(Score::Centipawns(value)),
                    Some("mate") => Some(Score::Mate(value)),
                    other => return Err(format!("unknown score kind {other:?} in {line:?}")),
                };
                i += 3;
                if matches!(parts.get(i).copied(), Some("lowerbound" | "upperbound")) {
                    bound = true;
                    i += 1;
                }
            }
            "pv" => {
                pv = parts[i + 1..].iter().map(|m| m.to_string()).collect();
                break;
            }
            // Free text or move lists we don't use run to end of line
            "string" | "refutation" | "currline" => break,
            "wdl" => i += 4,
            // seldepth, nodes, nps, time, hashfull, tbhits, cpuload, currmove, currmovenumber
            _ => i += 2,
        }
    }

    match score {
        Some(score) if !bound => Ok(Some(InfoLine {
            multipv,
            depth,
            score,
            pv,
        })),
        _ => Ok(None),
    }
}

/// Parse a `bestmove` line; `Ok(None)` for `bestmove (none)`.
pub fn parse_bestmove(line: &str) -> Result<Option<String>, String> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("bestmove") {
        return Err(format!("not a bestmove line: {line:?}"));
    }
    match parts.next() {
        Some("(none)") | Some("0000") => Ok(None),
        Some(mv) => Ok(Some(mv.to_string())),
        None => Err("bestmove line without a move".to_string()),
    }
}

/// Responses that are only valid during the handshake.
pub fn is_out_of_sequence(line: &str) -> bool {
    line == "uciok" || line == "readyok" || line.starts_with("id ") || line.starts_with("option ")
}

fn parse_number<T: std::str::FromStr>(parts: &[&str], index: usize, field: &str) -> Result<T, String> {
    let raw = parts
        .get(index)
        .ok_or_else(|| format!("missing value for {field}"))?;
    raw.parse()
        .map_err(|_| format!("invalid {field} value {raw:?}"))
}
