//! Data loading and validation
//!
//! Loads OHLC bar data from CSV files, clips it to the configured replay
//! window, and validates it before it reaches the strategy.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use itertools::Itertools;
use std::path::Path;
use tracing::info;

use crate::config::Resolution;
use crate::types::{Candle, Symbol};

/// Load OHLC bars from a CSV file.
///
/// Expects a header row followed by `datetime,open,high,low,close` columns.
/// Timestamps parse as RFC 3339 or as naive `%Y-%m-%d %H:%M:%S` assumed UTC.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path.as_ref())
        .context("Failed to open CSV file")?;

    let mut candles = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let datetime = dt_str
            .parse::<DateTime<Utc>>()
            .or_else(|_| {
                // Try parsing without timezone and assume UTC
                chrono::NaiveDateTime::parse_from_str(dt_str, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            })
            .context(format!("Failed to parse datetime: {}", dt_str))?;

        let open: f64 = record.get(1)
            .context("Missing open column")?
            .parse()
            .context("Failed to parse open")?;
        let high: f64 = record.get(2)
            .context("Missing high column")?
            .parse()
            .context("Failed to parse high")?;
        let low: f64 = record.get(3)
            .context("Missing low column")?
            .parse()
            .context("Failed to parse low")?;
        let close: f64 = record.get(4)
            .context("Missing close column")?
            .parse()
            .context("Failed to parse close")?;

        candles.push(Candle::new_unchecked(datetime, open, high, low, close));
    }

    Ok(candles)
}

/// Load bars for a symbol from `<data_dir>/<SYMBOL>_<resolution>.csv`
pub fn load_symbol_csv(
    data_dir: impl AsRef<Path>,
    symbol: &Symbol,
    resolution: Resolution,
) -> Result<Vec<Candle>> {
    let filename = format!("{}_{}.csv", symbol.as_str(), resolution);
    let path = data_dir.as_ref().join(&filename);

    let candles =
        load_csv(&path).context(format!("Failed to load data for {}", symbol))?;

    info!(
        "Loaded {} candles for {} from {}",
        candles.len(),
        symbol,
        path.display()
    );
    Ok(candles)
}

/// Keep only bars inside the replay window. Both dates are inclusive whole
/// days in UTC.
pub fn clip_to_window(mut candles: Vec<Candle>, start: NaiveDate, end: NaiveDate) -> Vec<Candle> {
    let start_dt =
        DateTime::<Utc>::from_naive_utc_and_offset(start.and_hms_opt(0, 0, 0).unwrap(), Utc);
    let end_dt = DateTime::<Utc>::from_naive_utc_and_offset(
        end.succ_opt().unwrap_or(end).and_hms_opt(0, 0, 0).unwrap(),
        Utc,
    );

    candles.retain(|c| c.datetime >= start_dt && c.datetime < end_dt);
    candles
}

/// Validate candle data for consistency
pub fn validate_candles(candles: &[Candle]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if candles.is_empty() {
        errors.push("No candles provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, candle) in candles.iter().enumerate() {
        if let Err(e) = candle.validate() {
            errors.push(format!("Candle {}: {}", i, e));
        }
    }

    for (i, (prev, next)) in candles.iter().tuple_windows().enumerate() {
        if next.datetime <= prev.datetime {
            warnings.push(format!("Candle {}: not chronological", i + 1));
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Deterministic oscillating minute bars for exercising the strategy
/// without a data file.
///
/// The close swings sinusoidally inside `mid +/- amplitude` with a full
/// cycle every `cycle_bars` bars, plus a small faster wobble so highs and
/// lows are not perfectly smooth. Both entry lines of a range strategy get
/// touched repeatedly over one cycle.
pub fn synthetic_range_series(
    start: DateTime<Utc>,
    bars: usize,
    mid: f64,
    amplitude: f64,
    cycle_bars: usize,
) -> Vec<Candle> {
    let cycle = cycle_bars.max(2) as f64;
    let spread = amplitude * 0.02;
    let mut candles = Vec::with_capacity(bars);
    let mut prev_close = mid;

    for i in 0..bars {
        let phase = i as f64 * std::f64::consts::TAU / cycle;
        let wobble = (i as f64 * 0.7).sin() * amplitude * 0.05;
        let close = mid + amplitude * phase.sin() + wobble;

        let open = prev_close;
        let high = open.max(close) + spread;
        let low = open.min(close) - spread;

        candles.push(Candle::new_unchecked(
            start + Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
        ));
        prev_close = close;
    }

    candles
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 10, 21, hour, minute, 0).unwrap()
    }

    fn bar(dt: DateTime<Utc>, close: f64) -> Candle {
        Candle::new_unchecked(dt, close, close + 0.0002, close - 0.0002, close)
    }

    #[test]
    fn test_load_csv_parses_both_datetime_formats() {
        let path = std::env::temp_dir().join(format!(
            "forex_range_strategies_load_csv_{}.csv",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "datetime,open,high,low,close\n\
             2019-10-21 10:00:00,1.1000,1.1005,1.0995,1.1002\n\
             2019-10-21T10:01:00Z,1.1002,1.1008,1.1000,1.1006\n",
        )
        .unwrap();

        let candles = load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].datetime, t(10, 0));
        assert_eq!(candles[1].datetime, t(10, 1));
        assert!((candles[0].open - 1.1000).abs() < 1e-9);
        assert!((candles[1].close - 1.1006).abs() < 1e-9);
    }

    #[test]
    fn test_load_symbol_csv_builds_conventional_path() {
        let dir = std::env::temp_dir().join(format!(
            "forex_range_strategies_symbol_csv_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("EURUSD_minute.csv"),
            "datetime,open,high,low,close\n2019-10-21 10:00:00,1.1000,1.1005,1.0995,1.1002\n",
        )
        .unwrap();

        let candles =
            load_symbol_csv(&dir, &Symbol::new("EURUSD"), Resolution::Minute).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].datetime, t(10, 0));
    }

    #[test]
    fn test_load_csv_rejects_unparseable_price() {
        let path = std::env::temp_dir().join(format!(
            "forex_range_strategies_bad_csv_{}.csv",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "datetime,open,high,low,close\n2019-10-21 10:00:00,1.1000,oops,1.0995,1.1002\n",
        )
        .unwrap();

        let result = load_csv(&path);
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_candles_accepts_clean_series() {
        let candles = vec![bar(t(10, 0), 1.1000), bar(t(10, 1), 1.1001)];
        let result = validate_candles(&candles);

        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_candles_rejects_inverted_range() {
        let bad = Candle::new_unchecked(t(10, 0), 1.1000, 1.0990, 1.1005, 1.1000);
        let result = validate_candles(&[bad]);

        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_validate_candles_warns_on_out_of_order_timestamps() {
        let candles = vec![bar(t(10, 1), 1.1000), bar(t(10, 0), 1.1001)];
        let result = validate_candles(&candles);

        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validate_candles_rejects_empty_input() {
        assert!(!validate_candles(&[]).is_valid());
    }

    #[test]
    fn test_clip_to_window_keeps_inclusive_days() {
        let start = NaiveDate::from_ymd_opt(2019, 10, 21).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 10, 21).unwrap();
        let candles = vec![
            bar(Utc.with_ymd_and_hms(2019, 10, 20, 23, 59, 0).unwrap(), 1.1),
            bar(Utc.with_ymd_and_hms(2019, 10, 21, 0, 0, 0).unwrap(), 1.1),
            bar(Utc.with_ymd_and_hms(2019, 10, 21, 23, 59, 0).unwrap(), 1.1),
            bar(Utc.with_ymd_and_hms(2019, 10, 22, 0, 0, 0).unwrap(), 1.1),
        ];

        let clipped = clip_to_window(candles, start, end);

        use chrono::Timelike;
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[0].datetime.hour(), 0);
        assert_eq!(clipped[1].datetime.hour(), 23);
    }

    #[test]
    fn test_synthetic_series_is_valid_and_bounded() {
        let candles = synthetic_range_series(t(0, 0), 500, 1.1000, 0.0050, 240);

        assert_eq!(candles.len(), 500);
        assert!(validate_candles(&candles).is_valid());

        for candle in &candles {
            assert!(candle.close > 1.1000 - 0.0060);
            assert!(candle.close < 1.1000 + 0.0060);
        }

        let touched_low = candles.iter().any(|c| c.low < 1.1000 - 0.0040);
        let touched_high = candles.iter().any(|c| c.high > 1.1000 + 0.0040);
        assert!(touched_low && touched_high);
    }

    #[test]
    fn test_synthetic_series_is_chronological() {
        let candles = synthetic_range_series(t(0, 0), 50, 1.1, 0.005, 20);
        assert!(validate_candles(&candles).warnings.is_empty());
        assert_eq!(candles[1].datetime - candles[0].datetime, Duration::minutes(1));
    }
}
