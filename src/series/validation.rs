//! OHLCV sanity checks and field repair at the ingestion boundary

use crate::models::Candle;

/// Last-resort price when neither a reference close nor the sample itself
/// carries a usable value.
pub const FALLBACK_PRICE: f64 = 1.0;

fn usable_price(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn is_valid(candle: &Candle) -> bool {
    let prices = [candle.open, candle.high, candle.low, candle.close];
    prices.iter().all(|p| usable_price(*p))
        && candle.volume.is_finite()
        && candle.volume >= 0.0
        && candle.low <= candle.high
        && candle.low <= candle.open
        && candle.low <= candle.close
        && candle.open <= candle.high
        && candle.close <= candle.high
}

/// Replace unusable fields of `candle`.
///
/// Each bad price takes the first usable value of `reference_close`, the
/// candle's own close, its own open, then [`FALLBACK_PRICE`]. High and low
/// are then widened to enclose open and close. Bad volume becomes zero.
pub fn repair(candle: &Candle, reference_close: Option<f64>) -> Candle {
    let substitute = [
        reference_close.unwrap_or(f64::NAN),
        candle.close,
        candle.open,
    ]
    .into_iter()
    .find(|p| usable_price(*p))
    .unwrap_or(FALLBACK_PRICE);

    let fix = |value: f64| if usable_price(value) { value } else { substitute };

    let open = fix(candle.open);
    let close = fix(candle.close);
    let high = fix(candle.high).max(open).max(close);
    let low = fix(candle.low).min(open).min(close);
    let volume = if candle.volume.is_finite() && candle.volume >= 0.0 {
        candle.volume
    } else {
        0.0
    };

    Candle {
        timestamp: candle.timestamp,
        open,
        high,
        low,
        close,
        volume,
    }
}
