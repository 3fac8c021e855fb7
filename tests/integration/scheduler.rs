//! Integration tests for the stream scheduler
//!
//! Runs against a scripted in-memory source with tokio's clock paused, so
//! every delay below is exact.


use candlestream::config::StreamConfig;
use candlestream::core::{StreamKey, StreamScheduler};
use candlestream::series::Interval;
use std::sync::Arc;
use tokio::time::sleep;

use test_utils::{candle, ms, Recorder, ScriptedSource, Step};

fn config() -> StreamConfig {
    StreamConfig {
        cycle_delay: ms(100),
        backoff_multiplier: 2.0,
        max_delay: ms(1000),
        max_consecutive_errors: 3,
        max_candles: 1000,
        latency_window: 50,
    }
}

async fn start(
    scheduler: &StreamScheduler,
    symbol: &str,
    delay_ms: u64,
    recorder: &Recorder,
) -> StreamKey {
    scheduler
        .start(
            symbol,
            Interval::OneMinute,
            ms(delay_ms),
            recorder.on_update(),
            recorder.on_error(),
        )
        .await
}

#[tokio::test(start_paused = true)]
async fn cycles_build_the_series_and_report_updates() {
    let source = Arc::new(ScriptedSource::new(vec![
        Step::Sample(candle(0, 100.0)),
        Step::Sample(candle(0, 102.0)),
        Step::Sample(candle(1, 103.0)),
        Step::Sample(candle(2, 104.0)),
    ]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    assert!(scheduler.is_running(&key).await);

    // Ticks at 0, 100, 200 and 300ms.
    sleep(ms(350)).await;

    assert_eq!(source.calls(), 4);
    assert_eq!(recorder.update_count(), 4);
    assert_eq!(recorder.error_count(), 0);

    let candles = scheduler.snapshot(&key).await.expect("stream is registered");
    assert_eq!(candles.len(), 3);
    assert_eq!(candles[0].close, 102.0, "same window updates in place");
    assert_eq!(candles[2].close, 104.0);

    let last_update = *recorder.updates.lock().unwrap().last().unwrap();
    assert_eq!(last_update, candles[2]);

    let stats = scheduler.stats(&key).await.unwrap();
    assert_eq!(stats.cycle_count, 4);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.series_len, 3);
    assert_eq!(stats.cycle_delay_ms, 100);
    assert_eq!(stats.last_valid_sample, Some(candles[2]));
}

#[tokio::test(start_paused = true)]
async fn invalid_sample_is_repaired_from_last_close() {
    let broken = nan_open_candle();
    let source = Arc::new(ScriptedSource::new(vec![
        Step::Sample(candle(0, 100.0)),
        Step::Sample(broken),
    ]));
    let scheduler = StreamScheduler::new(source, config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    sleep(ms(150)).await;

    assert_eq!(recorder.error_count(), 0);
    let candles = scheduler.snapshot(&key).await.unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].open, 100.0);
    assert_eq!(candles[1].close, 104.0);
    assert!(candles[1].high >= candles[1].open);
    assert!(candles[1].low <= candles[1].open);
}

fn nan_open_candle() -> candlestream::Candle {
    let mut broken = candle(1, 104.0);
    broken.open = f64::NAN;
    broken
}

#[tokio::test(start_paused = true)]
async fn empty_fetch_is_reported_as_error() {
    let source = Arc::new(ScriptedSource::new(vec![
        Step::Empty,
        Step::Sample(candle(0, 100.0)),
    ]));
    let scheduler = StreamScheduler::new(source, config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    sleep(ms(50)).await;

    assert_eq!(recorder.error_count(), 1);
    assert_eq!(recorder.terminal_count(), 0);
    assert!(scheduler.is_running(&key).await);
    assert_eq!(scheduler.snapshot(&key).await.unwrap().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn consecutive_failures_back_off_then_stop_the_stream() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Fail]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;

    // Failures at 0, 200 (100 * 2) and 600ms (200 + 100 * 4).
    sleep(ms(150)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(scheduler.stats(&key).await.unwrap().error_count, 1);

    sleep(ms(350)).await;
    assert_eq!(source.calls(), 2);

    sleep(ms(200)).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(recorder.error_count(), 4);
    assert_eq!(recorder.terminal_count(), 1);
    let last = recorder.errors.lock().unwrap().last().cloned().unwrap();
    assert!(last.contains("3 consecutive errors"), "got {last}");

    assert!(!scheduler.is_running(&key).await);
    assert!(scheduler.active_streams().await.is_empty());

    sleep(ms(5000)).await;
    assert_eq!(source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_backoff() {
    let source = Arc::new(ScriptedSource::new(vec![
        Step::Fail,
        Step::Fail,
        Step::Sample(candle(0, 100.0)),
    ]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;

    // Fail at 0, fail at 200, succeed at 600, then back to every 100ms.
    sleep(ms(650)).await;
    let stats = scheduler.stats(&key).await.unwrap();
    assert_eq!(stats.cycle_count, 3);
    assert_eq!(stats.error_count, 0);
    assert_eq!(recorder.update_count(), 1);

    sleep(ms(100)).await;
    assert_eq!(scheduler.stats(&key).await.unwrap().cycle_count, 4);
}

#[tokio::test(start_paused = true)]
async fn panicking_fetch_counts_as_cycle_error() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Panic]).with_latency(ms(250)));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;

    // The first fetch outlives the tick's wait and panics at 250ms.
    sleep(ms(280)).await;
    let stats = scheduler.stats(&key).await.expect("still below the ceiling");
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.cycle_count, 1);
    assert!(!stats.request_in_progress);
    assert_eq!(recorder.error_count(), 1);
    let first = recorder.errors.lock().unwrap()[0].clone();
    assert!(first.contains("scripted source blew up"), "got {first}");

    sleep(ms(5000)).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(recorder.error_count(), 4);
    assert_eq!(recorder.terminal_count(), 1);
    assert!(!scheduler.is_running(&key).await);
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_is_never_overlapped() {
    let source =
        Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]).with_latency(ms(250)));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;

    // First fetch runs 0..250ms; ticks at 100 and 200 skip it.
    sleep(ms(150)).await;
    assert_eq!(source.calls(), 1);
    assert!(scheduler.stats(&key).await.unwrap().request_in_progress);

    // Tick at 300 starts the second fetch, 400 and 500 skip again.
    sleep(ms(370)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(recorder.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_halts_polling() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    sleep(ms(150)).await;
    assert_eq!(source.calls(), 2);

    assert!(scheduler.stop(&key).await);
    assert!(!scheduler.stop(&key).await);
    assert!(!scheduler.is_running(&key).await);
    assert!(scheduler.snapshot(&key).await.is_none());
    assert!(scheduler.stats(&key).await.is_none());

    sleep(ms(1000)).await;
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn result_landing_after_stop_is_discarded() {
    let source =
        Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]).with_latency(ms(200)));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    sleep(ms(50)).await;
    assert_eq!(source.calls(), 1);

    scheduler.stop(&key).await;
    sleep(ms(500)).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(recorder.update_count(), 0);
    assert_eq!(recorder.error_count(), 0);
    assert!(scheduler.snapshot(&key).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn starting_an_active_key_replaces_the_stream() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let first = Recorder::default();
    let second = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &first).await;
    let replaced = start(&scheduler, "BTC", 100, &second).await;
    assert_eq!(key, replaced);
    assert_eq!(scheduler.active_streams().await, vec![key.clone()]);

    sleep(ms(250)).await;

    assert_eq!(second.update_count(), 3);
    assert!(first.update_count() <= 1);
    assert!(source.calls() <= 4);
}

#[tokio::test(start_paused = true)]
async fn changed_delay_applies_from_the_next_tick() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    sleep(ms(50)).await;
    assert!(scheduler.change_delay(&key, ms(300)).await);
    assert!(
        !scheduler
            .change_delay(&StreamKey::new("ETH", Interval::OneMinute), ms(300))
            .await
    );

    // The tick already scheduled for 100ms still fires, then every 300ms.
    sleep(ms(300)).await;
    assert_eq!(source.calls(), 2);
    sleep(ms(100)).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(scheduler.stats(&key).await.unwrap().cycle_delay_ms, 300);
}

#[tokio::test(start_paused = true)]
async fn streams_run_independently() {
    let source = Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]));
    let scheduler = StreamScheduler::new(source.clone(), config());
    let fast = Recorder::default();
    let slow = Recorder::default();

    let btc = start(&scheduler, "BTC", 100, &fast).await;
    let eth = start(&scheduler, "ETH", 300, &slow).await;

    sleep(ms(350)).await;
    assert_eq!(fast.update_count(), 4);
    assert_eq!(slow.update_count(), 2);

    scheduler.stop(&btc).await;
    assert!(scheduler.is_running(&eth).await);
    assert_eq!(scheduler.active_streams().await, vec![eth.clone()]);

    scheduler.stop_all().await;
    assert!(scheduler.active_streams().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stats_average_the_observed_latency() {
    let source =
        Arc::new(ScriptedSource::new(vec![Step::Sample(candle(0, 100.0))]).with_latency(ms(30)));
    let scheduler = StreamScheduler::new(source, config());
    let recorder = Recorder::default();

    let key = start(&scheduler, "BTC", 100, &recorder).await;
    sleep(ms(250)).await;

    let stats = scheduler.stats(&key).await.unwrap();
    assert_eq!(stats.cycle_count, 3);
    let average = stats.average_response_ms.expect("latency recorded");
    assert!((average - 30.0).abs() < 1.0, "average was {average}");
}
