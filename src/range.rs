//! Range tracking and range-bound classification
//!
//! Maintains the buy/sell entry lines derived from the rolling high/low of
//! recent bars, padded outward by an ATR buffer, and classifies whether the
//! market is currently range-bound enough to trade the lines.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::indicators::IndicatorSnapshot;

/// Band separations below this are indistinguishable from zero
const BAND_WIDTH_EPSILON: f64 = 1e-5;

/// Open interval for relative band width
const MIN_BAND_WIDTH: f64 = 0.0005;
const MAX_BAND_WIDTH: f64 = 0.01;

/// Open interval for price position inside the bands
const MIN_PRICE_POSITION: f64 = 0.1;
const MAX_PRICE_POSITION: f64 = 0.9;

/// SMA may drift from the band midline by at most this many ATRs
const SMA_FLATNESS_FACTOR: f64 = 0.5;

/// ATR buffer applied outside the rolling extremes, basic variant
pub const BASIC_BUFFER_FACTOR: f64 = 0.5;

/// ATR buffer applied outside the rolling extremes, range-filtered variant
pub const RANGE_FILTERED_BUFFER_FACTOR: f64 = 1.0;

/// Entry lines bracketing the observed range. Both unset until the first
/// successful refresh; `last_update` records when they were last computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeLevels {
    pub buy_line: Option<f64>,
    pub sell_line: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
}

impl RangeLevels {
    /// Both lines computed
    pub fn is_set(&self) -> bool {
        self.buy_line.is_some() && self.sell_line.is_some()
    }

    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match (self.buy_line, self.sell_line) {
            (Some(buy), Some(sell)) => Some((buy, sell)),
            _ => None,
        }
    }
}

/// When the tracker is allowed to recompute its levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshPolicy {
    /// Compute once, then hold for the lifetime of the run
    SetOnce,
    /// Recompute whenever at least this much time has passed since the
    /// previous refresh; the first ready tick always refreshes
    Interval(Duration),
}

/// Tracks buy/sell lines from rolling extremes with an ATR buffer.
///
/// `buy_line = rolling_low - buffer_factor * atr`
/// `sell_line = rolling_high + buffer_factor * atr`
///
/// Given rolling_low <= rolling_high and atr >= 0 this keeps
/// buy_line <= sell_line; with atr == 0 and a flat window the two lines
/// degenerate to equal, which is valid.
#[derive(Debug, Clone)]
pub struct RangeTracker {
    buffer_factor: f64,
    policy: RefreshPolicy,
    levels: RangeLevels,
}

impl RangeTracker {
    pub fn new(buffer_factor: f64, policy: RefreshPolicy) -> Self {
        Self {
            buffer_factor,
            policy,
            levels: RangeLevels::default(),
        }
    }

    pub fn levels(&self) -> RangeLevels {
        self.levels
    }

    /// Recompute the entry lines if the refresh policy allows it and the
    /// rolling high/low and ATR are all ready. Returns true when the levels
    /// were recomputed; on any precondition failure the previous levels are
    /// left untouched.
    pub fn update(&mut self, indicators: &IndicatorSnapshot, now: DateTime<Utc>) -> bool {
        match self.policy {
            RefreshPolicy::SetOnce => {
                if self.levels.is_set() {
                    return false;
                }
            }
            RefreshPolicy::Interval(interval) => {
                if let Some(last) = self.levels.last_update {
                    if now - last < interval {
                        return false;
                    }
                }
            }
        }

        let (rolling_high, rolling_low, atr) = match (
            indicators.rolling_high,
            indicators.rolling_low,
            indicators.atr,
        ) {
            (Some(high), Some(low), Some(atr)) => (high, low, atr),
            _ => return false,
        };

        let buy_line = rolling_low - self.buffer_factor * atr;
        let sell_line = rolling_high + self.buffer_factor * atr;
        self.levels = RangeLevels {
            buy_line: Some(buy_line),
            sell_line: Some(sell_line),
            last_update: Some(now),
        };

        debug!(
            "Range levels updated: buy_line={:.5}, sell_line={:.5} (low={:.5}, high={:.5}, atr={:.5})",
            buy_line, sell_line, rolling_low, rolling_high, atr
        );

        true
    }
}

/// Classify the market as range-bound from Bollinger geometry.
///
/// Fails closed: any unready input returns false. Requires all of
/// - relative band width strictly inside (0.0005, 0.01),
/// - price position within the bands strictly inside (0.1, 0.9),
/// - SMA within half an ATR of the band midline.
pub fn is_range_bound(price: f64, indicators: &IndicatorSnapshot) -> bool {
    let (bb_upper, bb_middle, bb_lower, sma, atr) = match (
        indicators.bb_upper,
        indicators.bb_middle,
        indicators.bb_lower,
        indicators.sma,
        indicators.atr,
    ) {
        (Some(u), Some(m), Some(l), Some(sma), Some(atr)) => (u, m, l, sma, atr),
        _ => return false,
    };

    let band_separation = bb_upper - bb_lower;
    if band_separation.abs() < BAND_WIDTH_EPSILON {
        return false;
    }

    let band_width = band_separation / bb_middle;
    let price_position = (price - bb_lower) / band_separation;

    let width_ok = band_width > MIN_BAND_WIDTH && band_width < MAX_BAND_WIDTH;
    let position_ok = price_position > MIN_PRICE_POSITION && price_position < MAX_PRICE_POSITION;
    let sma_flat = (sma - bb_middle).abs() < SMA_FLATNESS_FACTOR * atr;

    width_ok && position_ok && sma_flat
}
