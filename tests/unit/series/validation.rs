//! Unit tests for sample validation and repair

use candlestream::models::Candle;
use candlestream::series::{is_valid, repair, FALLBACK_PRICE};
use chrono::Utc;

fn sample(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle::new(open, high, low, close, volume, Utc::now())
}

fn fields_sane(c: &Candle) -> bool {
    [c.open, c.high, c.low, c.close]
        .iter()
        .all(|p| p.is_finite() && *p > 0.0)
        && c.volume.is_finite()
        && c.volume >= 0.0
}

#[test]
fn test_valid_sample() {
    assert!(is_valid(&sample(100.0, 110.0, 90.0, 105.0, 10.0)));
    assert!(is_valid(&sample(100.0, 100.0, 100.0, 100.0, 0.0)));
}

#[test]
fn test_invalid_samples() {
    assert!(!is_valid(&sample(0.0, 110.0, 90.0, 105.0, 10.0)));
    assert!(!is_valid(&sample(100.0, 110.0, 90.0, f64::NAN, 10.0)));
    assert!(!is_valid(&sample(100.0, 110.0, 90.0, 105.0, -1.0)));
    assert!(!is_valid(&sample(100.0, 95.0, 90.0, 105.0, 10.0)));
    assert!(!is_valid(&sample(100.0, 110.0, 101.0, 105.0, 10.0)));
    assert!(!is_valid(&sample(100.0, 90.0, 110.0, 100.0, 10.0)));
}

#[test]
fn test_repair_uses_reference_close_first() {
    let broken = sample(f64::NAN, 110.0, 90.0, 105.0, 10.0);
    let repaired = repair(&broken, Some(101.0));
    assert_eq!(repaired.open, 101.0);
    assert_eq!(repaired.close, 105.0);
    assert!(is_valid(&repaired));
}

#[test]
fn test_repair_falls_back_to_own_close_then_open() {
    let repaired = repair(&sample(-5.0, 110.0, 90.0, 105.0, 1.0), None);
    assert_eq!(repaired.open, 105.0);

    let repaired = repair(&sample(100.0, 0.0, 90.0, f64::NAN, 1.0), None);
    assert_eq!(repaired.close, 100.0);
    assert_eq!(repaired.high, 100.0);
}

#[test]
fn test_repair_hard_fallback_and_volume() {
    let repaired = repair(&sample(f64::NAN, f64::NAN, -1.0, 0.0, f64::NAN), None);
    assert_eq!(repaired.open, FALLBACK_PRICE);
    assert_eq!(repaired.close, FALLBACK_PRICE);
    assert_eq!(repaired.volume, 0.0);
    assert!(fields_sane(&repaired));

    let repaired = repair(&sample(100.0, 110.0, 90.0, 100.0, -3.0), None);
    assert_eq!(repaired.volume, 0.0);
}

#[test]
fn test_repair_reclamps_high_and_low() {
    // Repaired open above an untouched high widens the high
    let repaired = repair(&sample(f64::NAN, 102.0, 98.0, 100.0, 1.0), Some(150.0));
    assert_eq!(repaired.open, 150.0);
    assert_eq!(repaired.high, 150.0);
    assert!(is_valid(&repaired));

    // Repaired close below an untouched low widens the low
    let repaired = repair(&sample(100.0, 102.0, 98.0, 0.0, 1.0), Some(50.0));
    assert_eq!(repaired.low, 50.0);
    assert!(is_valid(&repaired));
}

#[test]
fn test_repair_always_yields_sane_fields() {
    let values = [f64::NAN, f64::INFINITY, -1.0, 0.0, 0.5, 100.0];
    for &open in &values {
        for &close in &values {
            for &high in &[f64::NAN, 0.0, 0.25, 120.0] {
                for &low in &[-2.0, 0.1, 150.0] {
                    for reference in [None, Some(f64::NAN), Some(99.0), Some(1e300)] {
                        let repaired = repair(&sample(open, high, low, close, f64::NAN), reference);
                        assert!(fields_sane(&repaired), "{:?}", repaired);
                        // Repaired samples never need a second repair.
                        assert!(is_valid(&repaired), "{:?}", repaired);
                    }
                }
            }
        }
    }
}
