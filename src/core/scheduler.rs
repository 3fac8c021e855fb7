//! Self-rescheduling polling streams keyed by (symbol, interval)
//!
//! Each stream owns one ticker task. A tick spawns a fetch cycle, waits for
//! it up to the configured delay, then sleeps for the backoff-adjusted
//! remainder. A fetch slower than the delay keeps running and later ticks
//! skip fetching until it lands.

use super::stream::{StreamKey, StreamState, StreamStats};
use crate::config::StreamConfig;
use crate::error::{SourceError, StreamError};
use crate::models::Candle;
use crate::series::{is_valid, repair, CandleSeries, Interval};
use crate::services::market_data::SampleSource;
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub type UpdateCallback = Arc<dyn Fn(&Candle) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&StreamError) + Send + Sync>;

const MIN_DELAY: Duration = Duration::from_millis(1);

/// Delay before the next tick.
///
/// `base` unchanged while healthy, otherwise `base * multiplier^errors`
/// capped at `max(max_delay, base)`. Never below 1ms and non-decreasing in
/// `consecutive_errors`.
pub fn backoff_delay(
    base: Duration,
    multiplier: f64,
    consecutive_errors: u32,
    max_delay: Duration,
) -> Duration {
    if consecutive_errors == 0 {
        return base.max(MIN_DELAY);
    }
    let cap = max_delay.max(base);
    let exponent = i32::try_from(consecutive_errors).unwrap_or(i32::MAX);
    let scaled_micros = base.as_micros() as f64 * multiplier.max(1.0).powi(exponent);
    let delay = if scaled_micros.is_finite() && scaled_micros < cap.as_micros() as f64 {
        Duration::from_micros(scaled_micros.round() as u64)
    } else {
        cap
    };
    delay.max(MIN_DELAY)
}

struct StreamEntry {
    generation: u64,
    state: StreamState,
    series: CandleSeries,
    cycle_delay: Duration,
    on_update: UpdateCallback,
    on_error: ErrorCallback,
    ticker: Option<JoinHandle<()>>,
    in_flight: Option<AbortHandle>,
}

impl StreamEntry {
    fn cancel(&mut self) {
        self.state.is_running = false;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(cycle) = self.in_flight.take() {
            cycle.abort();
        }
    }

    /// Validate, repair once if needed, and upsert the newest fetched sample.
    fn accept(&mut self, key: &StreamKey, samples: Vec<Candle>) -> Result<Candle, StreamError> {
        let sample = samples.last().copied().ok_or_else(|| SourceError::Empty {
            symbol: key.symbol.clone(),
            interval: key.interval.to_string(),
        })?;

        let sample = if is_valid(&sample) {
            sample
        } else {
            let reference_close = self.state.last_valid_sample.map(|c| c.close);
            let repaired = repair(&sample, reference_close);
            // `repair` re-clamps high/low, so this only trips if that changes.
            if !is_valid(&repaired) {
                return Err(StreamError::InvalidSample(sample));
            }
            debug!(stream = %key, ?sample, ?repaired, "StreamScheduler: repaired invalid sample");
            repaired
        };

        let action = self.series.upsert(sample);
        debug!(stream = %key, ?action, len = self.series.len(), "StreamScheduler: applied sample");
        self.state.last_valid_sample = Some(sample);
        Ok(self.series.last().copied().unwrap_or(sample))
    }
}

struct SchedulerInner {
    source: Arc<dyn SampleSource>,
    config: StreamConfig,
    streams: Mutex<HashMap<StreamKey, StreamEntry>>,
    next_generation: AtomicU64,
}

/// Registry of live streams. Cheap to clone; clones share the same streams.
#[derive(Clone)]
pub struct StreamScheduler {
    inner: Arc<SchedulerInner>,
}

impl StreamScheduler {
    pub fn new(source: Arc<dyn SampleSource>, config: StreamConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                source,
                config,
                streams: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    /// Start streaming `symbol` at `interval`, replacing any stream already
    /// running for that key. The first cycle runs immediately.
    pub async fn start<U, E>(
        &self,
        symbol: impl Into<String>,
        interval: Interval,
        cycle_delay: Duration,
        on_update: U,
        on_error: E,
    ) -> StreamKey
    where
        U: Fn(&Candle) + Send + Sync + 'static,
        E: Fn(&StreamError) + Send + Sync + 'static,
    {
        let key = StreamKey::new(symbol, interval);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut streams = self.inner.streams.lock().await;
        if let Some(mut previous) = streams.remove(&key) {
            previous.cancel();
            info!(stream = %key, "StreamScheduler: replacing existing stream for {}", key);
        }

        let ticker = tokio::spawn(run_ticker(self.inner.clone(), key.clone(), generation));
        streams.insert(
            key.clone(),
            StreamEntry {
                generation,
                state: StreamState::running(),
                series: CandleSeries::new(interval, self.inner.config.max_candles),
                cycle_delay,
                on_update: Arc::new(on_update),
                on_error: Arc::new(on_error),
                ticker: Some(ticker),
                in_flight: None,
            },
        );

        info!(
            stream = %key,
            delay_ms = cycle_delay.as_millis() as u64,
            "StreamScheduler: started stream {} every {}ms",
            key,
            cycle_delay.as_millis()
        );
        key
    }

    /// Stop a stream. Returns `false` if nothing was running for `key`.
    pub async fn stop(&self, key: &StreamKey) -> bool {
        let removed = self.inner.streams.lock().await.remove(key);
        match removed {
            Some(mut entry) => {
                entry.cancel();
                info!(stream = %key, cycles = entry.state.cycle_count, "StreamScheduler: stopped stream {}", key);
                true
            }
            None => {
                debug!(stream = %key, "StreamScheduler: stop on inactive stream {}", key);
                false
            }
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<(StreamKey, StreamEntry)> =
            self.inner.streams.lock().await.drain().collect();
        for (key, mut entry) in drained {
            entry.cancel();
            info!(stream = %key, "StreamScheduler: stopped stream {}", key);
        }
    }

    /// Change the delay of a running stream from the next tick on.
    pub async fn change_delay(&self, key: &StreamKey, cycle_delay: Duration) -> bool {
        let mut streams = self.inner.streams.lock().await;
        match streams.get_mut(key) {
            Some(entry) => {
                entry.cycle_delay = cycle_delay;
                info!(
                    stream = %key,
                    delay_ms = cycle_delay.as_millis() as u64,
                    "StreamScheduler: delay for {} changed to {}ms",
                    key,
                    cycle_delay.as_millis()
                );
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, key: &StreamKey) -> bool {
        self.inner
            .streams
            .lock()
            .await
            .get(key)
            .is_some_and(|entry| entry.state.is_running)
    }

    /// Copy of the stream's series, oldest first.
    pub async fn snapshot(&self, key: &StreamKey) -> Option<Vec<Candle>> {
        self.inner
            .streams
            .lock()
            .await
            .get(key)
            .map(|entry| entry.series.snapshot())
    }

    pub async fn stats(&self, key: &StreamKey) -> Option<StreamStats> {
        let streams = self.inner.streams.lock().await;
        streams.get(key).map(|entry| StreamStats {
            key: key.clone(),
            is_running: entry.state.is_running,
            cycle_count: entry.state.cycle_count,
            error_count: entry.state.error_count,
            request_in_progress: entry.state.request_in_progress,
            cycle_delay_ms: entry.cycle_delay.as_millis() as u64,
            average_response_ms: entry
                .state
                .average_response_time()
                .map(|d| d.as_secs_f64() * 1000.0),
            series_len: entry.series.len(),
            last_valid_sample: entry.state.last_valid_sample,
        })
    }

    pub async fn active_streams(&self) -> Vec<StreamKey> {
        let mut keys: Vec<StreamKey> = self.inner.streams.lock().await.keys().cloned().collect();
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        keys
    }
}

fn current_entry<'a>(
    streams: &'a mut HashMap<StreamKey, StreamEntry>,
    key: &StreamKey,
    generation: u64,
) -> Option<&'a mut StreamEntry> {
    streams
        .get_mut(key)
        .filter(|entry| entry.generation == generation && entry.state.is_running)
}

async fn run_ticker(inner: Arc<SchedulerInner>, key: StreamKey, generation: u64) {
    loop {
        let tick_started = Instant::now();

        let (cycle, base_delay) = {
            let mut streams = inner.streams.lock().await;
            let Some(entry) = current_entry(&mut streams, &key, generation) else {
                return;
            };
            if entry.state.request_in_progress {
                debug!(stream = %key, "StreamScheduler: request in flight for {}, skipping fetch", key);
                (None, entry.cycle_delay)
            } else {
                entry.state.request_in_progress = true;
                let handle = tokio::spawn(run_cycle(inner.clone(), key.clone(), generation));
                entry.in_flight = Some(handle.abort_handle());
                (Some(handle), entry.cycle_delay)
            }
        };

        if let Some(handle) = cycle {
            if let Ok(Err(join_error)) = tokio::time::timeout(base_delay, handle).await {
                if join_error.is_panic() {
                    error!(stream = %key, "StreamScheduler: cycle for {} panicked", key);
                    if let Some(entry) = current_entry(&mut *inner.streams.lock().await, &key, generation) {
                        entry.state.request_in_progress = false;
                        entry.in_flight = None;
                    }
                }
            }
        }

        let delay = {
            let mut streams = inner.streams.lock().await;
            let Some(entry) = current_entry(&mut streams, &key, generation) else {
                return;
            };
            backoff_delay(
                entry.cycle_delay,
                inner.config.backoff_multiplier,
                entry.state.error_count,
                inner.config.max_delay,
            )
        };
        tokio::time::sleep_until(tick_started + delay).await;
    }
}

enum CycleOutcome {
    Updated(Candle),
    Failed(StreamError, u32),
    Terminal(StreamError, u32),
}

async fn run_cycle(inner: Arc<SchedulerInner>, key: StreamKey, generation: u64) {
    let started = Instant::now();
    let fetched = AssertUnwindSafe(inner.source.fetch_latest(&key.symbol, key.interval))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(SourceError::Panicked(panic_message(payload.as_ref()))));
    let latency = started.elapsed();

    let (on_update, on_error, outcome) = {
        let mut streams = inner.streams.lock().await;
        let Some(entry) = current_entry(&mut streams, &key, generation) else {
            debug!(stream = %key, "StreamScheduler: discarding result for stopped stream {}", key);
            return;
        };

        entry.state.request_in_progress = false;
        entry.in_flight = None;
        entry.state.cycle_count += 1;
        entry
            .state
            .record_latency(latency, inner.config.latency_window);

        let result = fetched
            .map_err(StreamError::from)
            .and_then(|samples| entry.accept(&key, samples));
        let outcome = match result {
            Ok(latest) => {
                entry.state.error_count = 0;
                CycleOutcome::Updated(latest)
            }
            Err(e) => {
                entry.state.error_count += 1;
                let count = entry.state.error_count;
                if count >= inner.config.max_consecutive_errors {
                    CycleOutcome::Terminal(e, count)
                } else {
                    CycleOutcome::Failed(e, count)
                }
            }
        };
        let callbacks = (entry.on_update.clone(), entry.on_error.clone());

        if matches!(outcome, CycleOutcome::Terminal(..)) {
            // The ticker exits on its next lock once the entry is gone.
            streams.remove(&key);
        }
        (callbacks.0, callbacks.1, outcome)
    };

    match outcome {
        CycleOutcome::Updated(latest) => {
            debug!(
                stream = %key,
                close = latest.close,
                latency_ms = latency.as_millis() as u64,
                "StreamScheduler: cycle ok for {}",
                key
            );
            on_update(&latest);
        }
        CycleOutcome::Failed(e, count) => {
            warn!(
                stream = %key,
                error = %e,
                consecutive_errors = count,
                "StreamScheduler: cycle failed for {}",
                key
            );
            on_error(&e);
        }
        CycleOutcome::Terminal(e, count) => {
            on_error(&e);
            error!(
                stream = %key,
                error = %e,
                consecutive_errors = count,
                "StreamScheduler: stopping {} after {} consecutive errors",
                key,
                count
            );
            on_error(&StreamError::Terminal {
                consecutive_errors: count,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
