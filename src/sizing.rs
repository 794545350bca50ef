//! Position sizing
//!
//! Hedging-style sizing that rebalances open exposure toward the configured
//! risk/reward ratio. All lot arithmetic runs on `Lots` so repeated
//! rebalancing stays exact.

use rust_decimal_macros::dec;

use crate::config::StrategyConfig;
use crate::types::{ExposureState, Lots};

/// Rebalance targets overshoot slightly so the book crosses the configured
/// ratio instead of asymptotically approaching it
const REBALANCE_OVERSHOOT: Lots = Lots::new(dec!(1.1));

/// Sizes entries from current exposure and portfolio value
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// (risk_reward_ratio + 1) / risk_reward_ratio
    ratio_weight: Lots,
    base_position_fraction: Lots,
}

impl PositionSizer {
    pub fn new(config: &StrategyConfig) -> Self {
        let ratio = Lots::from_f64(config.risk_reward_ratio);
        Self {
            ratio_weight: (ratio + Lots::ONE) / ratio,
            base_position_fraction: Lots::from_f64(config.base_position_fraction),
        }
    }

    /// Lots for a new buy. May return zero or a negative quantity when
    /// exposure is already buy-heavy; callers must not trade those.
    pub fn size_buy(&self, exposure: &ExposureState, portfolio_value: f64) -> Lots {
        self.size(exposure.open_buy_lots, exposure.open_sell_lots, portfolio_value)
    }

    /// Lots for a new sell, mirror of [`Self::size_buy`]
    pub fn size_sell(&self, exposure: &ExposureState, portfolio_value: f64) -> Lots {
        self.size(exposure.open_sell_lots, exposure.open_buy_lots, portfolio_value)
    }

    fn size(&self, same_side: Lots, opposing: Lots, portfolio_value: f64) -> Lots {
        let cap = Lots::from_f64(portfolio_value) * self.base_position_fraction;

        if same_side.is_zero() && opposing.is_zero() {
            // Bootstrap entry: nothing on the book yet
            return cap;
        }

        let target = (self.ratio_weight * opposing - same_side) * REBALANCE_OVERSHOOT;
        target.min(cap)
    }
}
