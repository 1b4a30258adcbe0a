// tests/monitor_engine_tests.rs
//
// Monitor lifecycle against a scripted in-memory source, under paused tokio time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{analysis_service, manual_analysis, spec, ScriptedSource};
use crypto_pulse::errors::{AnalysisError, CycleError};
use crypto_pulse::monitor::{EngineState, MonitorEngine};
use crypto_pulse::snapshot::CHART_KLINE_LIMIT;

async fn book_id(engine: &MonitorEngine) -> i64 {
    engine.snapshot().read(|s| s.order_book.last_update_id).await
}

#[tokio::test(start_paused = true)]
async fn test_prime_fills_snapshot_before_first_tick() {
    let source = ScriptedSource::new();
    let (analysis, _tmp) = manual_analysis();
    let engine = MonitorEngine::new(spec("BTCUSDT", &["15m", "1h"], "30s"), source.clone(), analysis.clone());

    let chart = engine.prime().await.unwrap();
    assert_eq!(chart.kline.len(), 2);
    assert!(chart.kline.values().all(|k| k.len() == CHART_KLINE_LIMIT));
    assert_eq!(chart.depth.bids.get("1.00"), Some(&1.0));
    assert_eq!(book_id(&engine).await, 1);

    // Priming never requests an analysis
    assert_eq!(analysis.pending_count(), 0);
    assert_eq!(engine.cycles_completed(), 0);
    assert_eq!(engine.state(), EngineState::Created);
}

#[tokio::test(start_paused = true)]
async fn test_tick_refreshes_snapshot_and_issues_analysis() {
    let source = ScriptedSource::new();
    let (analysis, _tmp) = manual_analysis();
    let engine = Arc::new(MonitorEngine::new(
        spec("BTCUSDT", &["15m"], "30s"),
        source.clone(),
        analysis.clone(),
    ));
    engine.prime().await.unwrap();
    assert!(engine.start());
    assert_eq!(engine.state(), EngineState::Running);

    // First tick fires one full cycle after start
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(source.depth_calls(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.depth_calls(), 2);
    assert_eq!(book_id(&engine).await, 2);
    assert_eq!(engine.cycles_completed(), 1);

    let latest = engine.latest_chart().await;
    assert!(latest.depth.bids.contains_key("2.00"));

    let analysis_id = engine.last_analysis_id().expect("analysis issued");
    let prompt = analysis.pending_prompt(&analysis_id).expect("prompt pending");
    assert!(prompt.contains("BTCUSDT"));

    engine.stop();
    engine.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_future_ticks() {
    let source = ScriptedSource::new();
    let (analysis, _tmp) = manual_analysis();
    let engine = Arc::new(MonitorEngine::new(
        spec("ETHUSDT", &["1h"], "30s"),
        source.clone(),
        analysis,
    ));
    engine.prime().await.unwrap();
    engine.start();

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(engine.cycles_completed(), 1);

    engine.stop();
    engine.join().await;
    assert_eq!(engine.state(), EngineState::Stopped);
    let calls = source.depth_calls();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(source.depth_calls(), calls);
    assert_eq!(engine.cycles_completed(), 1);

    // Stop is idempotent
    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_keeps_previous_snapshot_and_loop_alive() {
    let source = ScriptedSource::new();
    let (analysis, _tmp) = manual_analysis();
    let engine = Arc::new(MonitorEngine::new(
        spec("BTCUSDT", &["15m"], "30s"),
        source.clone(),
        analysis.clone(),
    ));
    engine.prime().await.unwrap();
    engine.start();

    source.set_fail_depth(true);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(source.depth_calls(), 2);
    assert_eq!(book_id(&engine).await, 1);
    assert_eq!(engine.cycles_completed(), 0);
    assert_eq!(analysis.pending_count(), 0);
    assert_eq!(engine.state(), EngineState::Running);

    source.set_fail_depth(false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(book_id(&engine).await, 3);
    assert_eq!(engine.cycles_completed(), 1);
    assert_eq!(analysis.pending_count(), 1);

    engine.stop();
    engine.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_backend_fails_cycle_but_keeps_data() {
    let source = ScriptedSource::new();
    let (analysis, _tmp) = analysis_service("https://llm.example.com/v1");
    let engine = Arc::new(MonitorEngine::new(
        spec("BTCUSDT", &["15m"], "30s"),
        source.clone(),
        analysis.clone(),
    ));

    let err = engine.run_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::Analysis(AnalysisError::UnsupportedEndpoint(_))
    ));
    assert_eq!(book_id(&engine).await, 1);
    assert!(engine.latest_chart().await.depth.bids.contains_key("1.00"));
    assert!(engine.last_analysis_id().is_none());

    engine.start();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(source.depth_calls(), 2);
    assert_eq!(engine.state(), EngineState::Running);
    assert_eq!(engine.cycles_completed(), 0);
    assert_eq!(analysis.pending_count(), 0);

    engine.stop();
    engine.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_only_from_created() {
    let source = ScriptedSource::new();
    let (analysis, _tmp) = manual_analysis();

    let engine = Arc::new(MonitorEngine::new(
        spec("BTCUSDT", &["15m"], "30s"),
        source.clone(),
        analysis.clone(),
    ));
    assert!(engine.start());
    assert!(!engine.start());
    engine.stop();
    engine.join().await;

    let never_started = Arc::new(MonitorEngine::new(
        spec("BTCUSDT", &["15m"], "30s"),
        source.clone(),
        analysis,
    ));
    never_started.stop();
    assert!(!never_started.start());
    assert_eq!(never_started.state(), EngineState::Stopped);
    never_started.join().await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.depth_calls(), 0);
}
