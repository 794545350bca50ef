//! Core data types used across the strategy core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLC quote bar. Forex quote data carries no volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            datetime,
            open,
            high,
            low,
            close,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(datetime: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
        }
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// Check if the candle is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Instrument symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned into orders, fill events, and portfolio targets.
/// Arc<str> keeps those clones at O(1) instead of reallocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

// ============================================================================
// Lots - Precise Decimal Arithmetic for Position Quantities
// ============================================================================

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Lot quantity with precise decimal arithmetic.
///
/// Wraps `rust_decimal::Decimal` so that exposure accumulation over many
/// fills does not drift and sizing results come out exact.
///
/// # Example
/// ```
/// use forex_range_strategies::Lots;
/// let value = Lots::from_f64(1_000_000.0);
/// let fraction = Lots::from_f64(0.01);
/// assert_eq!((value * fraction).to_f64(), 10_000.0);
/// ```
#[derive(Debug, Clone, Copy, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lots(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Lots {
    /// Zero value
    pub const ZERO: Lots = Lots(Decimal::ZERO);

    /// One value
    pub const ONE: Lots = Lots(Decimal::ONE);

    /// Wrap a raw decimal
    pub const fn new(value: Decimal) -> Self {
        Lots(value)
    }

    /// Create from f64
    /// Note: conversion uses the shortest round-tripping decimal; extreme
    /// values (NaN, infinity) collapse to zero
    pub fn from_f64(value: f64) -> Self {
        Lots(Decimal::try_from(value).unwrap_or(Decimal::ZERO))
    }

    /// Convert to f64 (for price-level arithmetic that requires f64)
    pub fn to_f64(self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64().unwrap_or(0.0)
    }

    /// Get absolute value
    pub fn abs(self) -> Self {
        Lots(self.0.abs())
    }

    /// Check if value is zero
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Check if value is strictly positive
    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Get minimum of two values
    pub fn min(self, other: Self) -> Self {
        Lots(self.0.min(other.0))
    }

    /// Get maximum of two values
    pub fn max(self, other: Self) -> Self {
        Lots(self.0.max(other.0))
    }
}

impl Default for Lots {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Lots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for Lots {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialOrd for Lots {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lots {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Add for Lots {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Lots(self.0 + rhs.0)
    }
}

impl AddAssign for Lots {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Lots {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Lots(self.0 - rhs.0)
    }
}

impl Mul for Lots {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Lots(self.0 * rhs.0)
    }
}

impl Div for Lots {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        if rhs.0.is_zero() {
            Lots::ZERO // Safe division by zero handling
        } else {
            Lots(self.0 / rhs.0)
        }
    }
}

impl Neg for Lots {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Lots(-self.0)
    }
}

// ============================================================================
// Exposure bookkeeping
// ============================================================================

/// Open lot counters per direction.
///
/// Counters are lifetime-accumulated: fills only ever add (protective exits
/// add to the opposite side rather than netting), and the only way back to
/// zero is an explicit liquidation. Owned exclusively by the strategy core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureState {
    pub open_buy_lots: Lots,
    pub open_sell_lots: Lots,
}

impl ExposureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both counters at zero
    pub fn is_flat(&self) -> bool {
        self.open_buy_lots.is_zero() && self.open_sell_lots.is_zero()
    }

    /// Record a fill: the absolute quantity is added to the fill's side
    pub fn record_fill(&mut self, side: Side, quantity: Lots) {
        match side {
            Side::Buy => self.open_buy_lots += quantity.abs(),
            Side::Sell => self.open_sell_lots += quantity.abs(),
        }
    }

    /// Reset both counters to zero (liquidation)
    pub fn reset(&mut self) {
        self.open_buy_lots = Lots::ZERO;
        self.open_sell_lots = Lots::ZERO;
    }
}

// ============================================================================
// Portfolio contracts supplied by the host platform
// ============================================================================

/// Read-only portfolio view supplied per tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Total portfolio value; always positive in a funded account
    pub total_value: f64,
    pub unrealized_profit: f64,
    pub margin_remaining: f64,
    pub open_order_count: usize,
}

impl PortfolioSnapshot {
    /// Unrealized profit as a fraction of total value.
    ///
    /// # Panics
    /// Panics if `total_value` is not positive; a funded account is a
    /// precondition for every consumer of this ratio.
    pub fn unrealized_ratio(&self) -> f64 {
        assert!(
            self.total_value > 0.0,
            "portfolio total value must be positive, got {}",
            self.total_value
        );
        self.unrealized_profit / self.total_value
    }
}

/// Desired holding for one instrument; quantity 0 flattens it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTarget {
    pub symbol: Symbol,
    pub quantity: f64,
}

impl PortfolioTarget {
    pub fn new(symbol: Symbol, quantity: f64) -> Self {
        Self { symbol, quantity }
    }

    /// Flatten instruction for an instrument
    pub fn flat(symbol: Symbol) -> Self {
        Self {
            symbol,
            quantity: 0.0,
        }
    }

    pub fn is_flatten(&self) -> bool {
        self.quantity == 0.0
    }
}




#[cfg(test)]
mod portfolio_tests {
    use super::*;

    #[test]
    fn test_unrealized_ratio() {
        let portfolio = PortfolioSnapshot {
            total_value: 1_000_000.0,
            unrealized_profit: -25_000.0,
            margin_remaining: 900_000.0,
            open_order_count: 0,
        };
        assert!((portfolio.unrealized_ratio() + 0.025).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "portfolio total value must be positive")]
    fn test_unrealized_ratio_requires_funded_account() {
        let portfolio = PortfolioSnapshot {
            total_value: 0.0,
            unrealized_profit: 0.0,
            margin_remaining: 0.0,
            open_order_count: 0,
        };
        let _ = portfolio.unrealized_ratio();
    }

    #[test]
    fn test_flat_target() {
        let target = PortfolioTarget::flat(Symbol::new("EURUSD"));
        assert!(target.is_flatten());
        assert_eq!(target.symbol.as_str(), "EURUSD");
    }
}
