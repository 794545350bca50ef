//! Technical indicators
//!
//! Batch implementations over historical series. Each function returns one
//! output per input bar, with `None` until enough history has accumulated.

/// Rolling values for one bar, assembled by the replay engine and consumed
/// by the strategy core. A `None` field means the indicator is not ready.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    pub sma: Option<f64>,
    pub atr: Option<f64>,
    pub rolling_high: Option<f64>,
    pub rolling_low: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    /// Recent ready ATR values, most recent first, current value included.
    /// Bounded by the consumer's volatility window.
    pub atr_history: Vec<f64>,
}

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let sum: f64 = values[i + 1 - period..=i].iter().sum();
            result.push(Some(sum / period as f64));
        }
    }

    result
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    if values.is_empty() || period == 0 {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_value: Option<f64> = None;

    for (i, &value) in values.iter().enumerate() {
        if i < period - 1 {
            result.push(None);
        } else if i == period - 1 {
            // Initialize with SMA
            let sum: f64 = values[0..period].iter().sum();
            ema_value = Some(sum / period as f64);
            result.push(ema_value);
        } else {
            if let Some(prev_ema) = ema_value {
                let new_ema = (value - prev_ema) * multiplier + prev_ema;
                ema_value = Some(new_ema);
                result.push(Some(new_ema));
            }
        }
    }

    result
}

/// Calculate rolling maximum over a trailing window
pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let max = values[i + 1 - period..=i]
                .iter()
                .cloned()
                .fold(f64::MIN, f64::max);
            result.push(Some(max));
        }
    }

    result
}

/// Calculate rolling minimum over a trailing window
pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let min = values[i + 1 - period..=i]
                .iter()
                .cloned()
                .fold(f64::MAX, f64::min);
            result.push(Some(min));
        }
    }

    result
}

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Calculate Average True Range (ATR)
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let tr = true_range(high, low, close);
    ema(&tr, period)
}

/// Calculate Bollinger Bands
pub fn bollinger_bands(
    values: &[f64],
    period: usize,
    num_std: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let middle = sma(values, period);
    let mut upper = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if let Some(mid) = middle[i] {
            if i + 1 >= period {
                let window = &values[i + 1 - period..=i];
                let variance: f64 = window
                    .iter()
                    .map(|&x| {
                        let diff = x - mid;
                        diff * diff
                    })
                    .sum::<f64>()
                    / period as f64;
                let std_dev = variance.sqrt();

                upper.push(Some(mid + num_std * std_dev));
                lower.push(Some(mid - num_std * std_dev));
            } else {
                upper.push(None);
                lower.push(None);
            }
        } else {
            upper.push(None);
            lower.push(None);
        }
    }

    (upper, middle, lower)
}

/// Collect ready values from a batch series ending at `upto`, most recent
/// first, at most `limit` entries
pub fn recent_ready(series: &[Option<f64>], upto: usize, limit: usize) -> Vec<f64> {
    series[..=upto]
        .iter()
        .rev()
        .filter_map(|&v| v)
        .take(limit)
        .collect()
}
