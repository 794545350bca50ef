//! Risk management framework
//!
//! Layered pre-trade gates and the liquidation trigger. Every check is a
//! pure function of the portfolio snapshot, the indicator snapshot, and
//! immutable configuration; the strategy core owns all mutable state.

use tracing::{debug, info, warn};

use crate::config::{StrategyConfig, StrategyVariant};
use crate::indicators::IndicatorSnapshot;
use crate::types::{PortfolioSnapshot, PortfolioTarget, Symbol};

/// ATR-history samples averaged by the volatility spike check
pub const VOLATILITY_WINDOW: usize = 20;

/// Pre-trade risk gates bound to one strategy configuration
#[derive(Debug, Clone)]
pub struct RiskGate {
    variant: StrategyVariant,
    max_drawdown_fraction: f64,
    margin_fraction: f64,
    volatility_spike_multiplier: f64,
    max_open_orders: Option<usize>,
}

impl RiskGate {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            variant: config.variant,
            max_drawdown_fraction: config.max_drawdown_fraction,
            margin_fraction: config.margin_fraction,
            volatility_spike_multiplier: config.volatility_spike_multiplier,
            max_open_orders: config.max_open_orders,
        }
    }

    /// Unrealized loss beyond the configured fraction of portfolio value
    pub fn is_excessive_drawdown(&self, portfolio: &PortfolioSnapshot) -> bool {
        portfolio.unrealized_ratio() < -self.max_drawdown_fraction
    }

    /// Current ATR spiking above its recent average.
    ///
    /// The basic variant compares the current ATR against itself scaled by
    /// the spike multiplier, which can never fire for a multiplier above 1.
    /// The range-filtered variant averages the most recent
    /// `VOLATILITY_WINDOW` ready ATR samples (current included) and flags a
    /// spike when the current value exceeds the scaled average; with fewer
    /// samples, or a non-finite average, it reads as not high.
    pub fn is_volatility_high(&self, indicators: &IndicatorSnapshot) -> bool {
        let current_atr = match indicators.atr {
            Some(atr) => atr,
            None => return false,
        };

        match self.variant {
            StrategyVariant::Basic => {
                // TODO: compare against a rolling ATR average as the
                // range-filtered variant does; in this form the condition
                // can never be true.
                current_atr > current_atr * self.volatility_spike_multiplier
            }
            StrategyVariant::RangeFiltered => {
                if indicators.atr_history.len() < VOLATILITY_WINDOW {
                    return false;
                }
                let avg = match window_average(&indicators.atr_history[..VOLATILITY_WINDOW]) {
                    Some(avg) => avg,
                    None => {
                        debug!("ATR history average unavailable, treating volatility as not high");
                        return false;
                    }
                };
                current_atr > avg * self.volatility_spike_multiplier
            }
        }
    }

    /// All gates that must pass before a new entry order is placed
    pub fn can_trade(
        &self,
        portfolio: &PortfolioSnapshot,
        indicators: &IndicatorSnapshot,
        range_bound: bool,
    ) -> bool {
        if portfolio.margin_remaining <= portfolio.total_value * self.margin_fraction {
            return false;
        }
        if self.is_excessive_drawdown(portfolio) {
            return false;
        }
        if self.is_volatility_high(indicators) {
            return false;
        }

        if self.variant == StrategyVariant::RangeFiltered {
            if !range_bound {
                return false;
            }
            if let Some(max_open_orders) = self.max_open_orders {
                if portfolio.open_order_count >= max_open_orders {
                    return false;
                }
            }
        }

        true
    }

    /// Conditions that force a full flatten of the book
    pub fn should_liquidate(
        &self,
        portfolio: &PortfolioSnapshot,
        indicators: &IndicatorSnapshot,
    ) -> bool {
        self.is_excessive_drawdown(portfolio) || self.is_volatility_high(indicators)
    }
}

fn window_average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    avg.is_finite().then_some(avg)
}

/// Portfolio-wide drawdown overlay, invoked by the host once per scheduling
/// tick across all tradable instruments.
///
/// Acts as a hysteresis latch. A breach of the drawdown limit flattens
/// every instrument and latches; while latched, flatten targets keep being
/// emitted until unrealized P&L recovers to non-negative, at which point
/// the latch clears and proposed targets pass through again. Recovery to
/// merely above the limit is not enough to resume trading.
#[derive(Debug, Clone)]
pub struct DrawdownOverlay {
    max_drawdown_fraction: f64,
    exit_triggered: bool,
}

impl DrawdownOverlay {
    pub fn new(max_drawdown_fraction: f64) -> Self {
        Self {
            max_drawdown_fraction,
            exit_triggered: false,
        }
    }

    pub fn is_latched(&self) -> bool {
        self.exit_triggered
    }

    /// Review proposed portfolio targets against aggregate unrealized loss.
    /// Returns either the proposed targets unmodified or a flatten target
    /// for every known instrument.
    pub fn manage_risk(
        &mut self,
        portfolio: &PortfolioSnapshot,
        proposed: Vec<PortfolioTarget>,
        instruments: &[Symbol],
    ) -> Vec<PortfolioTarget> {
        let ratio = portfolio.unrealized_ratio();

        if ratio < -self.max_drawdown_fraction {
            if !self.exit_triggered {
                warn!(
                    "Portfolio drawdown {:.4} breached limit {:.4}, flattening all instruments",
                    ratio, self.max_drawdown_fraction
                );
            }
            self.exit_triggered = true;
            return Self::flatten_all(instruments);
        }

        if self.exit_triggered {
            if ratio >= 0.0 {
                info!(
                    "Unrealized P&L recovered to {:.4}, resuming normal targets",
                    ratio
                );
                self.exit_triggered = false;
                return proposed;
            }
            // Still under water: hold the book flat until full recovery
            return Self::flatten_all(instruments);
        }

        proposed
    }

    fn flatten_all(instruments: &[Symbol]) -> Vec<PortfolioTarget> {
        instruments
            .iter()
            .map(|symbol| PortfolioTarget::flat(symbol.clone()))
            .collect()
    }
}


#[cfg(test)]
mod overlay_tests {
    use super::*;

    fn portfolio(total: f64, unrealized: f64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_value: total,
            unrealized_profit: unrealized,
            margin_remaining: total,
            open_order_count: 0,
        }
    }

    fn instruments() -> Vec<Symbol> {
        vec![Symbol::new("EURUSD"), Symbol::new("GBPUSD")]
    }

    fn proposed() -> Vec<PortfolioTarget> {
        vec![PortfolioTarget::new(Symbol::new("EURUSD"), 10_000.0)]
    }

    #[test]
    fn test_passes_targets_through_when_healthy() {
        let mut overlay = DrawdownOverlay::new(0.02);
        let targets = overlay.manage_risk(&portfolio(1_000_000.0, 5_000.0), proposed(), &instruments());
        assert_eq!(targets, proposed());
        assert!(!overlay.is_latched());
    }

    #[test]
    fn test_breach_flattens_every_instrument() {
        let mut overlay = DrawdownOverlay::new(0.02);
        let targets =
            overlay.manage_risk(&portfolio(1_000_000.0, -25_000.0), proposed(), &instruments());

        assert!(overlay.is_latched());
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.is_flatten()));
    }

    #[test]
    fn test_latch_holds_until_full_recovery() {
        let mut overlay = DrawdownOverlay::new(0.02);
        overlay.manage_risk(&portfolio(1_000_000.0, -25_000.0), proposed(), &instruments());

        // Back above the limit but still under water: keep flattening
        let targets =
            overlay.manage_risk(&portfolio(1_000_000.0, -10_000.0), proposed(), &instruments());
        assert!(overlay.is_latched());
        assert!(targets.iter().all(|t| t.is_flatten()));

        let targets =
            overlay.manage_risk(&portfolio(1_000_000.0, -1.0), proposed(), &instruments());
        assert!(targets.iter().all(|t| t.is_flatten()));

        // Non-negative unrealized P&L clears the latch
        let targets = overlay.manage_risk(&portfolio(1_000_000.0, 0.0), proposed(), &instruments());
        assert!(!overlay.is_latched());
        assert_eq!(targets, proposed());
    }

    #[test]
    fn test_relapse_after_recovery_latches_again() {
        let mut overlay = DrawdownOverlay::new(0.02);
        overlay.manage_risk(&portfolio(1_000_000.0, -25_000.0), proposed(), &instruments());
        overlay.manage_risk(&portfolio(1_000_000.0, 1_000.0), proposed(), &instruments());
        assert!(!overlay.is_latched());

        let targets =
            overlay.manage_risk(&portfolio(1_000_000.0, -30_000.0), proposed(), &instruments());
        assert!(overlay.is_latched());
        assert!(targets.iter().all(|t| t.is_flatten()));
    }

    #[test]
    fn test_exact_threshold_does_not_latch() {
        let mut overlay = DrawdownOverlay::new(0.02);
        let targets =
            overlay.manage_risk(&portfolio(1_000_000.0, -20_000.0), proposed(), &instruments());
        assert!(!overlay.is_latched());
        assert_eq!(targets, proposed());
    }
}
