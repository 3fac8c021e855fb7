//! Candle Streamer
//!
//! Polls Hyperliquid for the latest candle of each configured symbol and
//! logs the series and the chart window a renderer would draw.

use candlestream::chart::Viewport;
use candlestream::config::{self, StreamConfig, ViewportConfig};
use candlestream::core::StreamScheduler;
use candlestream::logging;
use candlestream::series::Interval;
use candlestream::services::{FallbackSource, HyperliquidRestSource, SampleSource};
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let environment = config::get_environment();
    info!("Starting Candle Streamer");
    info!(environment = %environment, "Environment");

    let stream_config = StreamConfig::from_env();
    let symbols: Vec<String> = env::var("STREAM_SYMBOLS")
        .unwrap_or_else(|_| "BTC".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let interval = Interval::parse(&env::var("STREAM_INTERVAL").unwrap_or_else(|_| "1m".to_string()));

    if symbols.is_empty() {
        return Err("STREAM_SYMBOLS must name at least one symbol".into());
    }

    let base_url = config::get_hyperliquid_url();
    info!(url = %base_url, "Hyperliquid endpoint");
    let primary: Arc<dyn SampleSource> = Arc::new(HyperliquidRestSource::new(base_url));
    let source: Arc<dyn SampleSource> = Arc::new(FallbackSource::new(primary));

    let scheduler = StreamScheduler::new(source, stream_config.clone());

    for symbol in &symbols {
        let update_symbol = symbol.clone();
        let error_symbol = symbol.clone();
        scheduler
            .start(
                symbol.clone(),
                interval,
                stream_config.cycle_delay,
                move |candle| {
                    info!(
                        symbol = %update_symbol,
                        open = candle.open,
                        high = candle.high,
                        low = candle.low,
                        close = candle.close,
                        volume = candle.volume,
                        "Candle update"
                    );
                },
                move |e| {
                    if e.is_terminal() {
                        error!(symbol = %error_symbol, error = %e, "Stream terminated");
                    } else {
                        warn!(symbol = %error_symbol, error = %e, "Stream error");
                    }
                },
            )
            .await;
    }

    info!(symbols = ?symbols, interval = %interval, "Streams started, waiting for shutdown signal...");

    let mut report = tokio::time::interval(Duration::from_secs(30));
    let mut viewport = Viewport::new(ViewportConfig::default());
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutting down streamer...");
                scheduler.stop_all().await;
                info!("Streamer stopped");
                break;
            }
            _ = report.tick() => {
                for key in scheduler.active_streams().await {
                    let Some(candles) = scheduler.snapshot(&key).await else {
                        continue;
                    };
                    viewport.fit_visible(&candles);
                    let range = viewport.visible_range(candles.len());
                    let prices = viewport.price_range();
                    let stats = scheduler.stats(&key).await;
                    info!(
                        stream = %key,
                        candles = candles.len(),
                        visible_start = range.start_index,
                        visible_end = range.end_index,
                        min_price = prices.min_price,
                        max_price = prices.max_price,
                        avg_response_ms = ?stats.and_then(|s| s.average_response_ms),
                        "Stream report"
                    );
                }
                if scheduler.active_streams().await.is_empty() {
                    warn!("No streams left running, exiting");
                    break;
                }
            }
        }
    }

    Ok(())
}
