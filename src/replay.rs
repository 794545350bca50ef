//! In-process replay harness
//!
//! Stands in for the hosting platform: [`PaperExecution`] fills orders
//! against incoming bars and tracks a signed-lot position ledger, and
//! [`ReplayEngine`] drives the strategy, snapshots and the drawdown overlay
//! bar by bar. Event counts and the final portfolio value are the only
//! outputs; performance analytics stay out of scope.

use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::indicators::{
    atr, bollinger_bands, recent_ready, rolling_max, rolling_min, sma, IndicatorSnapshot,
};
use crate::orders::{ExecutionClient, OrderEvent, OrderStatus, OrderTicket};
use crate::risk::{DrawdownOverlay, VOLATILITY_WINDOW};
use crate::strategy::{RangeBoundStrategy, TickOutcome};
use crate::types::{Candle, Lots, PortfolioSnapshot, Side, Symbol};

/// Retail forex margin requirement, 50:1
const FOREX_LEVERAGE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Stop,
    Limit,
}

#[derive(Debug, Clone)]
struct PendingOrder {
    id: u64,
    symbol: Symbol,
    side: Side,
    quantity: Lots,
    trigger_price: f64,
    kind: PendingKind,
}

impl PendingOrder {
    /// Stops trigger when the bar trades through the price in the adverse
    /// direction, limits in the favorable one
    fn is_triggered(&self, candle: &Candle) -> bool {
        match (self.kind, self.side) {
            (PendingKind::Stop, Side::Buy) => candle.high >= self.trigger_price,
            (PendingKind::Stop, Side::Sell) => candle.low <= self.trigger_price,
            (PendingKind::Limit, Side::Buy) => candle.low <= self.trigger_price,
            (PendingKind::Limit, Side::Sell) => candle.high >= self.trigger_price,
        }
    }
}

/// Paper trading venue for a single instrument.
///
/// Market orders fill immediately at the close of the last stepped bar and
/// queue a fill event. Stop and limit orders rest until a bar trades
/// through their price, then fill at that price. `liquidate` closes the
/// net position without emitting fill events and cancels the instrument's
/// resting orders, so exposure counters driven by fill events read flat
/// right after it.
pub struct PaperExecution {
    cash: f64,
    price: f64,
    net_lots: Lots,
    avg_entry: f64,
    pending: Vec<PendingOrder>,
    events: Vec<OrderEvent>,
    next_order_id: u64,
}

impl PaperExecution {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: starting_cash,
            price: 0.0,
            net_lots: Lots::ZERO,
            avg_entry: 0.0,
            pending: Vec::new(),
            events: Vec::new(),
            next_order_id: 1,
        }
    }

    pub fn net_lots(&self) -> Lots {
        self.net_lots
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn pending_order_count(&self) -> usize {
        self.pending.len()
    }

    /// Advance to the next bar: update the mark price and fill any resting
    /// orders the bar traded through
    pub fn step(&mut self, candle: &Candle) {
        self.price = candle.close;

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for order in std::mem::take(&mut self.pending) {
            if order.is_triggered(candle) {
                self.fill(
                    order.id,
                    &order.symbol,
                    order.side,
                    order.quantity,
                    order.trigger_price,
                );
            } else {
                still_pending.push(order);
            }
        }
        self.pending = still_pending;
    }

    /// Fill events queued since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    /// Account state marked at the current price
    pub fn portfolio_snapshot(&self) -> PortfolioSnapshot {
        let unrealized = self.net_lots.to_f64() * (self.price - self.avg_entry);
        let total_value = self.cash + unrealized;
        let margin_used = self.net_lots.abs().to_f64() * self.price / FOREX_LEVERAGE;

        PortfolioSnapshot {
            total_value,
            unrealized_profit: unrealized,
            margin_remaining: total_value - margin_used,
            open_order_count: self.pending.len(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    /// Book a fill into the signed ledger and queue its event
    fn fill(&mut self, order_id: u64, symbol: &Symbol, side: Side, quantity: Lots, price: f64) {
        self.apply_fill(side, quantity, price);
        self.events.push(OrderEvent {
            order_id,
            symbol: symbol.clone(),
            side,
            quantity,
            fill_price: price,
            status: OrderStatus::Filled,
        });
    }

    /// Signed-lot position accounting: same-direction fills blend the
    /// average entry, opposing fills realize P&L into cash and may flip
    /// the position
    fn apply_fill(&mut self, side: Side, quantity: Lots, price: f64) {
        let signed = match side {
            Side::Buy => quantity.abs(),
            Side::Sell => -quantity.abs(),
        };
        if signed.is_zero() {
            return;
        }

        let prior = self.net_lots;
        let new_net = prior + signed;

        if prior.is_zero() {
            self.avg_entry = price;
        } else if prior.is_positive() == signed.is_positive() {
            let prior_abs = prior.abs().to_f64();
            let added = signed.abs().to_f64();
            self.avg_entry = (self.avg_entry * prior_abs + price * added) / (prior_abs + added);
        } else {
            let closing = prior.abs().min(signed.abs()).to_f64();
            let direction = if prior.is_positive() { 1.0 } else { -1.0 };
            self.cash += closing * (price - self.avg_entry) * direction;

            if signed.abs() > prior.abs() {
                // Flipped through flat: the remainder opens at this price
                self.avg_entry = price;
            } else if new_net.is_zero() {
                self.avg_entry = 0.0;
            }
        }

        self.net_lots = new_net;
    }
}

impl ExecutionClient for PaperExecution {
    fn market_order(
        &mut self,
        symbol: &Symbol,
        side: Side,
        quantity: Lots,
    ) -> Result<OrderTicket> {
        let id = self.next_id();
        self.fill(id, symbol, side, quantity, self.price);
        Ok(OrderTicket {
            id,
            status: OrderStatus::Filled,
        })
    }

    fn stop_market_order(
        &mut self,
        symbol: &Symbol,
        side: Side,
        quantity: Lots,
        stop_price: f64,
    ) -> Result<OrderTicket> {
        let id = self.next_id();
        self.pending.push(PendingOrder {
            id,
            symbol: symbol.clone(),
            side,
            quantity,
            trigger_price: stop_price,
            kind: PendingKind::Stop,
        });
        Ok(OrderTicket {
            id,
            status: OrderStatus::Submitted,
        })
    }

    fn limit_order(
        &mut self,
        symbol: &Symbol,
        side: Side,
        quantity: Lots,
        limit_price: f64,
    ) -> Result<OrderTicket> {
        let id = self.next_id();
        self.pending.push(PendingOrder {
            id,
            symbol: symbol.clone(),
            side,
            quantity,
            trigger_price: limit_price,
            kind: PendingKind::Limit,
        });
        Ok(OrderTicket {
            id,
            status: OrderStatus::Submitted,
        })
    }

    fn liquidate(&mut self, symbol: &Symbol) -> Result<()> {
        let before = self.pending.len();
        self.pending.retain(|p| p.symbol != *symbol);

        if !self.net_lots.is_zero() {
            let side = if self.net_lots.is_positive() {
                Side::Sell
            } else {
                Side::Buy
            };
            let quantity = self.net_lots.abs();
            self.apply_fill(side, quantity, self.price);
            debug!(
                "Liquidated {} lots of {} at {:.5}, canceled {} resting orders",
                quantity,
                symbol,
                self.price,
                before - self.pending.len()
            );
        }

        Ok(())
    }
}

/// Totals from a replay run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub ticks: usize,
    pub entries: usize,
    pub liquidations: usize,
    pub skips: usize,
    pub final_value: f64,
}

/// Drives one strategy over a bar series against [`PaperExecution`]
pub struct ReplayEngine {
    config: Config,
}

impl ReplayEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Replay the strategy over the bars in order. Indicators are computed
    /// over the whole series up front; each bar then sees only values that
    /// were ready at its own index.
    pub fn run(&self, candles: &[Candle]) -> Result<ReplayReport> {
        let symbol = self.config.account.symbol();
        let strategy_cfg = &self.config.strategy;

        let mut strategy = RangeBoundStrategy::new(symbol.clone(), strategy_cfg);
        let mut overlay = DrawdownOverlay::new(strategy_cfg.max_drawdown_fraction);
        let mut execution = PaperExecution::new(self.config.account.starting_cash);
        let instruments = [symbol.clone()];

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let sma_series = sma(&closes, strategy_cfg.range_lookback);
        let atr_series = atr(&highs, &lows, &closes, strategy_cfg.atr_period);
        let high_series = rolling_max(&highs, strategy_cfg.range_lookback);
        let low_series = rolling_min(&lows, strategy_cfg.range_lookback);
        let (bb_upper, bb_middle, bb_lower) = bollinger_bands(
            &closes,
            strategy_cfg.range_lookback,
            strategy_cfg.bollinger_std_dev,
        );

        info!(
            "Replaying {} bars of {} with the {} strategy",
            candles.len(),
            symbol,
            strategy_cfg.variant
        );

        let mut report = ReplayReport::default();

        for (i, candle) in candles.iter().enumerate() {
            execution.step(candle);

            for event in execution.drain_events() {
                strategy.on_order_event(&event);
            }

            let snapshot = IndicatorSnapshot {
                sma: sma_series[i],
                atr: atr_series[i],
                rolling_high: high_series[i],
                rolling_low: low_series[i],
                bb_upper: bb_upper[i],
                bb_middle: bb_middle[i],
                bb_lower: bb_lower[i],
                atr_history: recent_ready(&atr_series, i, VOLATILITY_WINDOW),
            };
            let portfolio = execution.portfolio_snapshot();

            let outcome = strategy.on_tick(
                candle.datetime,
                candle.close,
                &snapshot,
                &portfolio,
                &mut execution,
            )?;

            report.ticks += 1;
            match outcome {
                TickOutcome::Entered(_) => report.entries += 1,
                TickOutcome::Liquidated => report.liquidations += 1,
                TickOutcome::AwaitingIndicators
                | TickOutcome::NotRangeBound
                | TickOutcome::NoTrade => report.skips += 1,
            }

            // The overlay reviews the book after the tick's own trading
            let reviewed = execution.portfolio_snapshot();
            let targets = overlay.manage_risk(&reviewed, Vec::new(), &instruments);
            if targets.iter().any(|t| t.symbol == symbol && t.is_flatten()) {
                strategy.liquidate(&mut execution)?;
                report.liquidations += 1;
            }
        }

        report.final_value = execution.portfolio_snapshot().total_value;

        info!(
            "Replay finished: {} ticks, {} entries, {} liquidations, {} skips, final value {:.2}",
            report.ticks, report.entries, report.liquidations, report.skips, report.final_value
        );

        Ok(report)
    }
}
