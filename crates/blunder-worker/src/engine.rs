//! Engine process channel: one UCI engine process and the line protocol with it.
//!
//! All engine I/O goes through here. Requests are strictly serialised by
//! `&mut self`; every read is bounded by a deadline so a hung process shows
//! up as [`EngineError::Timeout`] instead of blocking the worker forever.

use std::collections::BTreeMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluation::{Engine, EvaluationRequest, EvaluationResult, PvLine};
use crate::uci::{self, InfoLine};

/// A running engine process.
///
/// Must be released with [`EngineChannel::close`]. Dropping an unclosed
/// channel kills the process.
pub struct EngineChannel {
    config: EngineConfig,
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    name: String,
    /// MultiPV value currently set on the engine
    multipv: usize,
    /// A request was abandoned with its response still unread
    desynced: bool,
    terminated: bool,
}

impl EngineChannel {
    /// Spawn the engine and complete the UCI handshake.
    pub async fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut process = Command::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::StartFailure(format!(
                    "failed to spawn {}: {e}",
                    config.path.display()
                ))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::StartFailure("engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::StartFailure("engine stdout not captured".into()))?;

        let mut channel = Self {
            config: config.clone(),
            process,
            stdin,
            stdout: BufReader::new(stdout),
            name: String::new(),
            multipv: 1,
            desynced: false,
            terminated: false,
        };

        match timeout(config.handshake_timeout, channel.handshake()).await {
            Ok(Ok(())) => {
                info!(
                    engine = %channel.name,
                    pid = ?channel.process.id(),
                    "Engine ready"
                );
                Ok(channel)
            }
            Ok(Err(e)) => {
                channel.kill().await;
                Err(EngineError::StartFailure(format!("handshake failed: {e}")))
            }
            Err(_) => {
                channel.kill().await;
                Err(EngineError::StartFailure(format!(
                    "no handshake response within {:?}",
                    config.handshake_timeout
                )))
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.write_line("uci").await?;
        loop {
            let line = self.read_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.to_string();
            } else if line == "uciok" {
                break;
            }
        }
        if self.name.is_empty() {
            self.name = "Unknown Engine".to_string();
        }

        // Configure for analysis
        self.write_line(&format!("setoption name Threads value {}", self.config.threads))
            .await?;
        self.write_line(&format!("setoption name Hash value {}", self.config.hash_mb))
            .await?;
        self.sync().await
    }

    /// `isready` round trip.
    async fn sync(&mut self) -> Result<(), EngineError> {
        self.write_line("isready").await?;
        self.wait_for("readyok").await
    }

    /// Name reported via `id name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    /// Run one evaluation request and collect its lines.
    pub async fn send(
        &mut self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EngineError> {
        if self.terminated {
            return Err(EngineError::Exited);
        }
        if self.desynced {
            return Err(EngineError::Desynchronised);
        }

        if request.lines != self.multipv {
            self.write_line(&uci::multipv_command(request.lines)).await?;
            self.multipv = request.lines;
        }
        self.write_line(&uci::position_command(&request.fingerprint))
            .await?;
        self.write_line(&uci::go_command(&request.limits)).await?;

        let deadline = request.limits.deadline(self.config.grace_period);
        match timeout(deadline, self.read_response(request.lines)).await {
            Ok(result) => result,
            Err(_) => {
                self.desynced = true;
                Err(EngineError::Timeout(deadline))
            }
        }
    }

    /// Read `info` lines up to the terminating `bestmove`.
    ///
    /// Malformed lines are remembered but reading continues, so that the
    /// stream is back in sync before the error is reported.
    async fn read_response(&mut self, lines: usize) -> Result<EvaluationResult, EngineError> {
        let mut by_rank: BTreeMap<usize, InfoLine> = BTreeMap::new();
        let mut protocol_error: Option<String> = None;

        let best_move = loop {
            let line = self.read_line().await?;

            if line.starts_with("info") {
                match uci::parse_info(&line) {
                    Ok(Some(info)) => {
                        by_rank.insert(info.multipv, info);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        protocol_error.get_or_insert(e);
                    }
                }
            } else if line.starts_with("bestmove") {
                match uci::parse_bestmove(&line) {
                    Ok(best) => break best,
                    Err(e) => {
                        protocol_error.get_or_insert(e);
                        break None;
                    }
                }
            } else if uci::is_out_of_sequence(&line) {
                protocol_error.get_or_insert(format!("unexpected {line:?} during search"));
            }
        };

        if let Some(e) = protocol_error {
            return Err(EngineError::Protocol(e));
        }

        let score = by_rank
            .get(&1)
            .map(|info| info.score)
            .ok_or_else(|| EngineError::Protocol("no score reported for best line".into()))?;

        let lines = by_rank
            .into_values()
            .take(lines)
            .map(|info| PvLine {
                rank: info.multipv,
                score: info.score,
                moves: info.pv,
            })
            .collect();

        Ok(EvaluationResult {
            score,
            lines,
            best_move,
        })
    }

    /// Tell the engine a new game starts.
    pub async fn reset(&mut self) -> Result<(), EngineError> {
        self.write_line("ucinewgame").await?;
        let bound = self.config.handshake_timeout;
        match timeout(bound, self.sync()).await {
            Ok(result) => result,
            Err(_) => {
                self.desynced = true;
                Err(EngineError::Timeout(bound))
            }
        }
    }

    /// Kill the current process and start a fresh one with the same config.
    pub async fn respawn(&mut self) -> Result<(), EngineError> {
        warn!(engine = %self.name, pid = ?self.process.id(), "Restarting engine");
        self.kill().await;
        let fresh = Self::open(&self.config).await?;
        // The old process is already reaped, its Drop is a no-op
        *self = fresh;
        Ok(())
    }

    /// Ask the engine to quit, killing it if it doesn't within the shutdown timeout.
    pub async fn close(mut self) -> Result<(), EngineError> {
        if self.terminated {
            return Ok(());
        }

        let _ = self.write_line("quit").await;
        match timeout(self.config.shutdown_timeout, self.process.wait()).await {
            Ok(Ok(status)) => {
                debug!(engine = %self.name, %status, "Engine exited");
                self.terminated = true;
                Ok(())
            }
            Ok(Err(e)) => {
                self.kill().await;
                Err(EngineError::Io(e))
            }
            Err(_) => {
                warn!(
                    engine = %self.name,
                    timeout = ?self.config.shutdown_timeout,
                    "Engine ignored quit, killing"
                );
                self.kill().await;
                Ok(())
            }
        }
    }

    async fn kill(&mut self) {
        if let Err(e) = self.process.kill().await {
            debug!(error = %e, "Kill failed (process already gone?)");
        }
        self.terminated = true;
    }

    async fn write_line(&mut self, cmd: &str) -> Result<(), EngineError> {
        trace!(cmd, "engine <");
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Next trimmed line; end of stream means the process is gone.
    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let bytes = self.stdout.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(EngineError::Exited);
        }
        let trimmed = line.trim();
        trace!(line = trimmed, "engine >");
        Ok(trimmed.to_string())
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }
}

impl Engine for EngineChannel {
    async fn analyse(
        &mut self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EngineError> {
        self.send(request).await
    }

    async fn restart(&mut self) -> Result<(), EngineError> {
        self.respawn().await
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.reset().await
    }
}

impl Drop for EngineChannel {
    fn drop(&mut self) {
        if !self.terminated {
            // Best-effort synchronous kill in drop
            let _ = self.process.start_kill();
        }
    }
}
