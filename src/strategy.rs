//! Range-bound trading strategy core
//!
//! One configurable engine covers both deployed variants: the basic
//! strategy computes its support/resistance lines once and trades them for
//! the whole run, while the range-filtered strategy refreshes the lines on
//! a wall-clock interval and only trades when the market classifies as
//! range-bound. The tick handler threads explicit state through the range
//! tracker, filter, risk gates, sizer and order orchestrator.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::{StrategyConfig, StrategyVariant};
use crate::indicators::IndicatorSnapshot;
use crate::orders::{ExecutionClient, OrderEvent, OrderOrchestrator, OrderStatus};
use crate::range::{
    is_range_bound, RangeLevels, RangeTracker, RefreshPolicy, BASIC_BUFFER_FACTOR,
    RANGE_FILTERED_BUFFER_FACTOR,
};
use crate::risk::RiskGate;
use crate::sizing::PositionSizer;
use crate::types::{ExposureState, PortfolioSnapshot, Side, Symbol};

/// What a single tick decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Range levels are not computable yet
    AwaitingIndicators,
    /// Range-filtered variant only: market currently classifies as trending
    NotRangeBound,
    /// A risk condition forced a full flatten
    Liquidated,
    /// An entry filled on the given side
    Entered(Side),
    /// Price inside the range, gates blocked the entry, or the entry did
    /// not fill
    NoTrade,
}

/// Single-instrument mean-reversion strategy around a tracked price range
pub struct RangeBoundStrategy {
    symbol: Symbol,
    variant: StrategyVariant,
    tracker: RangeTracker,
    gate: RiskGate,
    sizer: PositionSizer,
    orchestrator: OrderOrchestrator,
    exposure: ExposureState,
}

impl RangeBoundStrategy {
    pub fn new(symbol: Symbol, config: &StrategyConfig) -> Self {
        let tracker = match config.variant {
            StrategyVariant::Basic => {
                RangeTracker::new(BASIC_BUFFER_FACTOR, RefreshPolicy::SetOnce)
            }
            StrategyVariant::RangeFiltered => {
                // Interval presence is enforced by config validation
                let minutes = config.range_update_interval_minutes.unwrap_or(240);
                RangeTracker::new(
                    RANGE_FILTERED_BUFFER_FACTOR,
                    RefreshPolicy::Interval(Duration::minutes(minutes as i64)),
                )
            }
        };

        info!(
            "Initialized {} strategy for {} (r2r={}, base_fraction={})",
            config.variant, symbol, config.risk_reward_ratio, config.base_position_fraction
        );

        Self {
            symbol,
            variant: config.variant,
            tracker,
            gate: RiskGate::new(config),
            sizer: PositionSizer::new(config),
            orchestrator: OrderOrchestrator::new(config.risk_reward_ratio),
            exposure: ExposureState::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn exposure(&self) -> &ExposureState {
        &self.exposure
    }

    pub fn range_levels(&self) -> RangeLevels {
        self.tracker.levels()
    }

    /// One market-data update. Refreshes the range, applies the filter and
    /// risk gates, and places an entry with its protective bracket when the
    /// price touches one of the lines.
    pub fn on_tick(
        &mut self,
        now: DateTime<Utc>,
        price: f64,
        indicators: &IndicatorSnapshot,
        portfolio: &PortfolioSnapshot,
        client: &mut dyn ExecutionClient,
    ) -> Result<TickOutcome> {
        self.tracker.update(indicators, now);

        let (buy_line, sell_line) = match self.tracker.levels().as_pair() {
            Some(pair) => pair,
            None => return Ok(TickOutcome::AwaitingIndicators),
        };

        let range_bound = match self.variant {
            StrategyVariant::Basic => true,
            StrategyVariant::RangeFiltered => is_range_bound(price, indicators),
        };
        if !range_bound {
            debug!("Market classified as trending at {:.5}, standing aside", price);
            return Ok(TickOutcome::NotRangeBound);
        }

        if self.gate.should_liquidate(portfolio, indicators) {
            self.liquidate(client)?;
            return Ok(TickOutcome::Liquidated);
        }

        let atr = match indicators.atr {
            Some(atr) => atr,
            None => return Ok(TickOutcome::AwaitingIndicators),
        };

        if price <= buy_line {
            self.try_enter(client, Side::Buy, buy_line, atr, indicators, portfolio, range_bound)
        } else if price >= sell_line {
            self.try_enter(client, Side::Sell, sell_line, atr, indicators, portfolio, range_bound)
        } else {
            Ok(TickOutcome::NoTrade)
        }
    }

    /// Fill notifications from the execution collaborator. Every fill adds
    /// to the counter on its own side, protective exits included; a fill
    /// for a self-placed market entry lands on top of the orchestrator's
    /// direct booking.
    pub fn on_order_event(&mut self, event: &OrderEvent) {
        if event.status != OrderStatus::Filled || event.symbol != self.symbol {
            return;
        }

        self.exposure.record_fill(event.side, event.quantity);
        debug!(
            "Fill recorded: {:?} {} lots at {:.5}, exposure buy={} sell={}",
            event.side,
            event.quantity.abs(),
            event.fill_price,
            self.exposure.open_buy_lots,
            self.exposure.open_sell_lots
        );
    }

    /// Flatten everything held in the instrument and zero the exposure
    /// counters. Counters stay untouched when the flatten request fails.
    pub fn liquidate(&mut self, client: &mut dyn ExecutionClient) -> Result<()> {
        info!(
            "Liquidating {}: exposure buy={} sell={}",
            self.symbol, self.exposure.open_buy_lots, self.exposure.open_sell_lots
        );
        client.liquidate(&self.symbol)?;
        self.exposure.reset();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn try_enter(
        &mut self,
        client: &mut dyn ExecutionClient,
        side: Side,
        entry_line: f64,
        atr: f64,
        indicators: &IndicatorSnapshot,
        portfolio: &PortfolioSnapshot,
        range_bound: bool,
    ) -> Result<TickOutcome> {
        let lots = match side {
            Side::Buy => self.sizer.size_buy(&self.exposure, portfolio.total_value),
            Side::Sell => self.sizer.size_sell(&self.exposure, portfolio.total_value),
        };

        if !lots.is_positive() {
            debug!("{:?} size {} is not positive, no entry", side, lots);
            return Ok(TickOutcome::NoTrade);
        }

        if !self.gate.can_trade(portfolio, indicators, range_bound) {
            debug!("Risk gates blocked {:?} entry of {} lots", side, lots);
            return Ok(TickOutcome::NoTrade);
        }

        let entry = self.orchestrator.execute_entry(
            client,
            &mut self.exposure,
            &self.symbol,
            side,
            lots,
            entry_line,
            atr,
        )?;

        Ok(match entry {
            Some(_) => TickOutcome::Entered(side),
            None => TickOutcome::NoTrade,
        })
    }
}
