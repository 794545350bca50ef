//! Order placement
//!
//! The strategy core never talks to a venue directly. It goes through the
//! [`ExecutionClient`] trait, and the orchestrator turns a sized entry into
//! a market order plus its protective stop/limit bracket.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::types::{ExposureState, Lots, Side, Symbol};

/// Lifecycle state reported for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Accepted but not yet executed
    Submitted,
    Filled,
    Canceled,
}

/// Handle returned by the execution collaborator for a placed order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTicket {
    pub id: u64,
    pub status: OrderStatus,
}

impl OrderTicket {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// Fill notification pushed back by the execution collaborator
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub order_id: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Lots,
    pub fill_price: f64,
    pub status: OrderStatus,
}

/// Order placement boundary. Implementations sit at the platform edge, so
/// every method may fail.
pub trait ExecutionClient {
    /// Place a market order; the returned ticket reports whether it filled
    /// immediately
    fn market_order(&mut self, symbol: &Symbol, side: Side, quantity: Lots)
        -> Result<OrderTicket>;

    /// Place a resting stop-market order. Buy stops trigger at or above the
    /// stop price, sell stops at or below.
    fn stop_market_order(
        &mut self,
        symbol: &Symbol,
        side: Side,
        quantity: Lots,
        stop_price: f64,
    ) -> Result<OrderTicket>;

    /// Place a resting limit order. Buy limits execute at or below the limit
    /// price, sell limits at or above.
    fn limit_order(
        &mut self,
        symbol: &Symbol,
        side: Side,
        quantity: Lots,
        limit_price: f64,
    ) -> Result<OrderTicket>;

    /// Flatten all holdings in the instrument and cancel its resting orders
    fn liquidate(&mut self, symbol: &Symbol) -> Result<()>;
}

/// A sized entry with its protective prices, emitted to the execution
/// collaborator and never stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderIntent {
    pub side: Side,
    pub quantity: Lots,
    pub stop_price: f64,
    pub take_profit_price: f64,
}

impl OrderIntent {
    /// Intent for an entry at a range line. Buys stop one ATR below the
    /// line and take profit `risk_reward_ratio` ATRs above it; sells mirror.
    pub fn for_entry(
        side: Side,
        quantity: Lots,
        entry_line: f64,
        atr: f64,
        risk_reward_ratio: f64,
    ) -> Self {
        let (stop_price, take_profit_price) = match side {
            Side::Buy => (entry_line - atr, entry_line + atr * risk_reward_ratio),
            Side::Sell => (entry_line + atr, entry_line - atr * risk_reward_ratio),
        };
        OrderIntent {
            side,
            quantity,
            stop_price,
            take_profit_price,
        }
    }
}

/// Tickets produced by a completed entry. The protective legs are optional
/// because their placement may fail after the entry has already filled;
/// that failure is logged, not compensated.
#[derive(Debug, Clone)]
pub struct EntryOrders {
    pub market: OrderTicket,
    pub stop: Option<OrderTicket>,
    pub take_profit: Option<OrderTicket>,
}

/// Places entries and their protective brackets
#[derive(Debug, Clone)]
pub struct OrderOrchestrator {
    risk_reward_ratio: f64,
}

impl OrderOrchestrator {
    pub fn new(risk_reward_ratio: f64) -> Self {
        Self { risk_reward_ratio }
    }

    /// Place a market entry and, once it is confirmed filled, record the
    /// exposure and place the paired stop and take-profit orders on the
    /// opposite side.
    ///
    /// Returns `Ok(None)` when the market order does not fill; exposure is
    /// untouched and nothing else is placed in that case. The fill event
    /// for the entry also flows through the caller's event handler, so a
    /// self-placed market fill is counted twice; exposure counters track
    /// order activity, not net position.
    pub fn execute_entry(
        &self,
        client: &mut dyn ExecutionClient,
        exposure: &mut ExposureState,
        symbol: &Symbol,
        side: Side,
        quantity: Lots,
        entry_line: f64,
        atr: f64,
    ) -> Result<Option<EntryOrders>> {
        let intent = OrderIntent::for_entry(side, quantity, entry_line, atr, self.risk_reward_ratio);

        let market = client.market_order(symbol, intent.side, intent.quantity)?;
        if !market.is_filled() {
            debug!(
                "Entry market order {} for {} {} lots not filled, no bracket placed",
                market.id, symbol, intent.quantity
            );
            return Ok(None);
        }

        exposure.record_fill(intent.side, intent.quantity);
        let exit_side = intent.side.opposite();

        let stop = match client.stop_market_order(
            symbol,
            exit_side,
            intent.quantity,
            intent.stop_price,
        ) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!("Failed to place stop order for {}: {:#}", symbol, e);
                None
            }
        };

        let take_profit =
            match client.limit_order(symbol, exit_side, intent.quantity, intent.take_profit_price)
            {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    warn!("Failed to place take-profit order for {}: {:#}", symbol, e);
                    None
                }
            };

        info!(
            "{:?} entry filled for {}: {} lots, stop={:.5}, take_profit={:.5}",
            intent.side, symbol, intent.quantity, intent.stop_price, intent.take_profit_price
        );

        Ok(Some(EntryOrders {
            market,
            stop,
            take_profit,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_intent_prices() {
        let intent =
            OrderIntent::for_entry(Side::Buy, Lots::new(dec!(10_000)), 1.0995, 0.0010, 2.0);
        assert_eq!(intent.side, Side::Buy);
        assert_eq!(intent.quantity, Lots::new(dec!(10_000)));
        assert!((intent.stop_price - 1.0985).abs() < 1e-9);
        assert!((intent.take_profit_price - 1.1015).abs() < 1e-9);
    }

    #[test]
    fn test_sell_intent_mirrors_buy() {
        let intent =
            OrderIntent::for_entry(Side::Sell, Lots::new(dec!(5_000)), 1.1055, 0.0010, 2.0);
        assert!((intent.stop_price - 1.1065).abs() < 1e-9);
        assert!((intent.take_profit_price - 1.1035).abs() < 1e-9);
    }

    #[test]
    fn test_take_profit_distance_scales_with_ratio() {
        let intent =
            OrderIntent::for_entry(Side::Buy, Lots::new(dec!(1_000)), 1.1000, 0.0010, 3.0);
        assert!((intent.take_profit_price - 1.1030).abs() < 1e-9);
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Placed {
        Market(Side, Lots),
        Stop(Side, Lots, f64),
        Limit(Side, Lots, f64),
    }

    struct ScriptedClient {
        next_id: u64,
        fill_market: bool,
        fail_stop: bool,
        placed: Vec<Placed>,
    }

    impl ScriptedClient {
        fn new(fill_market: bool) -> Self {
            Self {
                next_id: 1,
                fill_market,
                fail_stop: false,
                placed: Vec::new(),
            }
        }

        fn ticket(&mut self, status: OrderStatus) -> OrderTicket {
            let id = self.next_id;
            self.next_id += 1;
            OrderTicket { id, status }
        }
    }

    impl ExecutionClient for ScriptedClient {
        fn market_order(
            &mut self,
            _symbol: &Symbol,
            side: Side,
            quantity: Lots,
        ) -> Result<OrderTicket> {
            self.placed.push(Placed::Market(side, quantity));
            let status = if self.fill_market {
                OrderStatus::Filled
            } else {
                OrderStatus::Submitted
            };
            Ok(self.ticket(status))
        }

        fn stop_market_order(
            &mut self,
            _symbol: &Symbol,
            side: Side,
            quantity: Lots,
            stop_price: f64,
        ) -> Result<OrderTicket> {
            if self.fail_stop {
                return Err(anyhow!("stop rejected"));
            }
            self.placed.push(Placed::Stop(side, quantity, stop_price));
            Ok(self.ticket(OrderStatus::Submitted))
        }

        fn limit_order(
            &mut self,
            _symbol: &Symbol,
            side: Side,
            quantity: Lots,
            limit_price: f64,
        ) -> Result<OrderTicket> {
            self.placed.push(Placed::Limit(side, quantity, limit_price));
            Ok(self.ticket(OrderStatus::Submitted))
        }

        fn liquidate(&mut self, _symbol: &Symbol) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_filled_entry_places_opposite_side_bracket() {
        let orchestrator = OrderOrchestrator::new(2.0);
        let mut client = ScriptedClient::new(true);
        let mut exposure = ExposureState::new();
        let lots = Lots::new(dec!(10_000));

        let entry = orchestrator
            .execute_entry(
                &mut client,
                &mut exposure,
                &Symbol::new("EURUSD"),
                Side::Buy,
                lots,
                1.0995,
                0.0010,
            )
            .unwrap()
            .expect("entry should fill");

        assert!(entry.market.is_filled());
        assert!(entry.stop.is_some());
        assert!(entry.take_profit.is_some());
        assert_eq!(exposure.open_buy_lots, lots);

        assert_eq!(client.placed.len(), 3);
        assert_eq!(client.placed[0], Placed::Market(Side::Buy, lots));
        match client.placed[1] {
            Placed::Stop(side, quantity, price) => {
                assert_eq!(side, Side::Sell);
                assert_eq!(quantity, lots);
                assert!((price - 1.0985).abs() < 1e-9);
            }
            _ => panic!("expected stop order second"),
        }
        match client.placed[2] {
            Placed::Limit(side, quantity, price) => {
                assert_eq!(side, Side::Sell);
                assert_eq!(quantity, lots);
                assert!((price - 1.1015).abs() < 1e-9);
            }
            _ => panic!("expected limit order third"),
        }
    }

    #[test]
    fn test_unfilled_entry_leaves_exposure_and_places_nothing_else() {
        let orchestrator = OrderOrchestrator::new(2.0);
        let mut client = ScriptedClient::new(false);
        let mut exposure = ExposureState::new();

        let entry = orchestrator
            .execute_entry(
                &mut client,
                &mut exposure,
                &Symbol::new("EURUSD"),
                Side::Sell,
                Lots::new(dec!(5_000)),
                1.1055,
                0.0010,
            )
            .unwrap();

        assert!(entry.is_none());
        assert!(exposure.is_flat());
        assert_eq!(client.placed.len(), 1);
        assert!(matches!(client.placed[0], Placed::Market(Side::Sell, _)));
    }

    #[test]
    fn test_stop_failure_still_places_take_profit() {
        let orchestrator = OrderOrchestrator::new(2.0);
        let mut client = ScriptedClient::new(true);
        client.fail_stop = true;
        let mut exposure = ExposureState::new();

        let entry = orchestrator
            .execute_entry(
                &mut client,
                &mut exposure,
                &Symbol::new("EURUSD"),
                Side::Buy,
                Lots::new(dec!(1_000)),
                1.0995,
                0.0010,
            )
            .unwrap()
            .expect("entry should fill");

        assert!(entry.stop.is_none());
        assert!(entry.take_profit.is_some());
        assert!(client
            .placed
            .iter()
            .any(|p| matches!(p, Placed::Limit(Side::Sell, _, _))));
    }
}
