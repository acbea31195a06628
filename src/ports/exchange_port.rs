//! Exchange port: market data, prices and trade submission.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::error::EvotraderError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::TradeAction;

/// A trade submitted by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub agent: String,
    pub signal: TradeAction,
    pub quantity: f64,
}

/// Per-agent execution tally kept by an exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentActivity {
    pub trades: usize,
    pub net_quantity: f64,
    pub gross_quantity: f64,
}

impl AgentActivity {
    pub fn record(&mut self, order: &TradeOrder) {
        self.trades += 1;
        self.net_quantity += order.quantity;
        self.gross_quantity += order.quantity.abs();
    }
}

pub trait Exchange {
    /// Up to `max_history_count` most recent bars with timestamp <= `now`,
    /// oldest first.
    fn get_market_data(
        &self,
        now: NaiveDateTime,
        max_history_count: usize,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, EvotraderError>;

    /// Close of the bar stamped exactly `now`.
    fn get_current_price(&self, now: NaiveDateTime) -> Result<f64, EvotraderError>;

    fn execute_trade(&mut self, order: &TradeOrder) -> Result<(), EvotraderError>;

    /// Default implementation: the exchange keeps no tally.
    fn get_performance(&self) -> BTreeMap<String, AgentActivity> {
        BTreeMap::new()
    }
}
