//! EngineChannel against a scripted UCI process.

#![cfg(unix)]

mod common;

use std::time::Duration;

use blunder_worker::{EngineChannel, EngineError, EvaluationRequest, Score, SearchLimits};
use common::{fast, FakeEngine, AFTER_E4, BLUNDER_AFTER_E4, CRASH_ONCE, HANG};

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[tokio::test]
async fn test_handshake_configures_engine() {
    let fake = FakeEngine::new(BLUNDER_AFTER_E4);
    let channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    assert_eq!(channel.name(), "FakeFish 1.0");
    assert!(channel.pid().is_some());

    let commands = fake.commands();
    assert_eq!(commands[0], "uci");
    assert!(commands.contains(&"setoption name Threads value 1".to_string()));
    assert!(commands.contains(&"setoption name Hash value 16".to_string()));
    assert!(commands.contains(&"isready".to_string()));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_single_line_evaluation() {
    let fake = FakeEngine::new(BLUNDER_AFTER_E4);
    let mut channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    let result = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap();
    assert_eq!(result.score, Score::Centipawns(25));
    assert_eq!(result.best_move.as_deref(), Some("a7a6"));

    // Bound scores are ignored, the exact score wins
    let result = channel
        .send(&EvaluationRequest::new(AFTER_E4, fast(), 1))
        .await
        .unwrap();
    assert_eq!(result.score, Score::Centipawns(-600));
    assert_eq!(result.lines.len(), 1);

    assert!(fake.commands().contains(&format!("position fen {AFTER_E4}")));
    assert!(fake.commands().contains(&"go movetime 10".to_string()));
    // MultiPV never changed from the engine default
    assert!(!fake.commands().iter().any(|c| c.contains("MultiPV")));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_multipv_lines_come_back_ranked() {
    let fake = FakeEngine::new(BLUNDER_AFTER_E4);
    let mut channel = EngineChannel::open(&fake.engine_config()).await.unwrap();
    let limits = SearchLimits::new(Some(Duration::from_millis(10)), Some(5));

    let result = channel
        .send(&EvaluationRequest::new(AFTER_E4, limits, 3))
        .await
        .unwrap();
    let firsts: Vec<&str> = result.lines.iter().filter_map(|l| l.first_move()).collect();
    assert_eq!(firsts, vec!["e7e5", "d7d5", "g8f6"]);
    assert_eq!(result.score, Score::Centipawns(-550));
    assert!(fake.commands().contains(&"go movetime 10 depth 5".to_string()));

    // Asking for fewer lines than the engine sends caps the result
    let result = channel
        .send(&EvaluationRequest::new(AFTER_E4, limits, 2))
        .await
        .unwrap();
    assert_eq!(result.lines.len(), 2);

    // Back to a single line resets MultiPV
    channel
        .send(&EvaluationRequest::new(AFTER_E4, fast(), 1))
        .await
        .unwrap();

    assert_eq!(fake.count("setoption name MultiPV value 3"), 1);
    assert_eq!(fake.count("setoption name MultiPV value 2"), 1);
    assert_eq!(fake.count("setoption name MultiPV value 1"), 1);

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_response_keeps_channel_usable() {
    let fake = FakeEngine::new(
        r#"
if [ "$searches" -eq 1 ]; then
  echo "info depth 5 multipv 1 score cp abc pv e2e4"
  echo "bestmove e2e4"
else
  echo "info depth 5 multipv 1 score cp 12 pv e2e4"
  echo "bestmove e2e4"
fi
"#,
    );
    let mut channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    let err = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Protocol(_)));
    assert!(!err.needs_restart());

    let result = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap();
    assert_eq!(result.score, Score::Centipawns(12));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_score_is_protocol_error() {
    let fake = FakeEngine::new(r#"echo "bestmove e2e4""#);
    let mut channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    let err = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Protocol(_)));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_hung_engine_times_out_and_is_replaced() {
    let fake = FakeEngine::new(HANG);
    let mut config = fake.engine_config();
    config.grace_period = Duration::from_millis(300);
    let mut channel = EngineChannel::open(&config).await.unwrap();
    let first_pid = channel.pid();

    let err = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout(d) if d == Duration::from_millis(310)));
    assert!(err.needs_restart());

    // The unanswered search is still pending, so no new request goes out
    let err = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Desynchronised));
    assert_eq!(fake.count("go movetime 10"), 1);

    channel.respawn().await.unwrap();
    assert_ne!(channel.pid(), first_pid);
    assert_eq!(fake.count("uci"), 2);
    assert_eq!(channel.name(), "FakeFish 1.0");

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_crash_is_reported_and_recoverable() {
    let fake = FakeEngine::new(CRASH_ONCE);
    let mut channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    let err = channel
        .send(&EvaluationRequest::new(START, fast(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Exited));

    channel.respawn().await.unwrap();
    let result = channel
        .send(&EvaluationRequest::new(AFTER_E4, fast(), 1))
        .await
        .unwrap();
    assert_eq!(result.score, Score::Centipawns(-600));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_new_game_round_trip() {
    let fake = FakeEngine::new(BLUNDER_AFTER_E4);
    let mut channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    channel.reset().await.unwrap();
    channel.reset().await.unwrap();
    assert_eq!(fake.count("ucinewgame"), 2);

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_engine_that_exits_immediately_fails_to_start() {
    let fake = FakeEngine::raw("exit 0");
    match EngineChannel::open(&fake.engine_config()).await {
        Err(EngineError::StartFailure(msg)) => assert!(msg.contains("handshake")),
        Err(other) => panic!("expected StartFailure, got {other:?}"),
        Ok(_) => panic!("engine should not have started"),
    }
}

#[tokio::test]
async fn test_engine_without_uciok_fails_to_start() {
    let fake = FakeEngine::raw("while read -r line; do echo \"id name Mute\"; done");
    let mut config = fake.engine_config();
    config.handshake_timeout = Duration::from_millis(300);

    match EngineChannel::open(&config).await {
        Err(EngineError::StartFailure(msg)) => assert!(msg.contains("handshake")),
        Err(other) => panic!("expected StartFailure, got {other:?}"),
        Ok(_) => panic!("engine should not have started"),
    }
}

#[tokio::test]
async fn test_close_sends_quit_exactly_once() {
    let fake = FakeEngine::new(BLUNDER_AFTER_E4);
    let channel = EngineChannel::open(&fake.engine_config()).await.unwrap();

    channel.close().await.unwrap();
    assert_eq!(fake.count("quit"), 1);
}

#[tokio::test]
async fn test_engine_ignoring_quit_is_killed() {
    let fake = FakeEngine::raw(
        r#"
while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
  esac
done
"#,
    );
    let mut config = fake.engine_config();
    config.shutdown_timeout = Duration::from_millis(200);
    let channel = EngineChannel::open(&config).await.unwrap();
    assert_eq!(channel.name(), "Unknown Engine");

    let started = std::time::Instant::now();
    channel.close().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
}
