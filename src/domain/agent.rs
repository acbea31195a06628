//! Trading agent: sizes strategy decisions into trades and scores the outcome.
//!
//! Each `update` appends one [`DecisionRecord`] (intent, executed or not); each
//! submitted trade also lands in the [`ExecutedTrade`] ledger. Drawdown marks the
//! portfolio at every decision price but only applies executed quantities, and
//! fitness is defined over the executed ledger.

use chrono::NaiveDateTime;
use tracing::debug;

use super::error::EvotraderError;
use super::interval::Interval;
use super::strategy::{TradeAction, TradingStrategy};
use crate::ports::exchange_port::{Exchange, TradeOrder};

/// Per-agent economics, identical across a population.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub initial_capital: f64,
    /// Fraction of the initial capital sized into each decision.
    pub position_size_percent: f64,
    /// Notional floor below which no trade is submitted.
    pub min_trade_size: f64,
    /// Fraction of notional charged per trade.
    pub transaction_fee: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            initial_capital: 1000.0,
            position_size_percent: 0.1,
            min_trade_size: 1.0,
            transaction_fee: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    /// Sized quantity, whether or not it cleared `min_trade_size`.
    pub quantity: f64,
    pub executed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTrade {
    pub timestamp: NaiveDateTime,
    pub signal: TradeAction,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
}

#[derive(Debug, Clone)]
pub struct TradingAgent<S> {
    name: String,
    strategy: S,
    capital: f64,
    initial_capital: f64,
    position: f64,
    transaction_fee: f64,
    min_trade_size: f64,
    /// Fixed at construction from the initial capital.
    max_position_value: f64,
    decisions: Vec<DecisionRecord>,
    trades: Vec<ExecutedTrade>,
}

impl<S: TradingStrategy> TradingAgent<S> {
    pub fn new(name: impl Into<String>, strategy: S, config: &AgentConfig) -> Self {
        TradingAgent {
            name: name.into(),
            strategy,
            capital: config.initial_capital,
            initial_capital: config.initial_capital,
            position: 0.0,
            transaction_fee: config.transaction_fee,
            min_trade_size: config.min_trade_size,
            max_position_value: config.initial_capital * config.position_size_percent,
            decisions: Vec::new(),
            trades: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    pub fn trades(&self) -> &[ExecutedTrade] {
        &self.trades
    }

    /// One simulation step at `now`.
    ///
    /// A failure (no window, no price, strategy or exchange error) leaves the
    /// agent untouched and records nothing.
    pub fn update<E: Exchange + ?Sized>(
        &mut self,
        exchange: &mut E,
        now: NaiveDateTime,
        max_history_count: usize,
        interval: Interval,
    ) -> Result<(), EvotraderError> {
        let window = exchange.get_market_data(now, max_history_count, interval)?;
        let price = exchange.get_current_price(now)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(EvotraderError::InvalidPrice {
                timestamp: now,
                price,
            });
        }
        let decision = self.strategy.decide(&window)?;

        // direction comes from the action; confidence only scales the size
        let max_quantity = self.max_position_value / price;
        let quantity = max_quantity * decision.confidence.abs() * decision.action.sign();

        let executed = quantity.abs() * price > self.min_trade_size;
        if executed {
            exchange.execute_trade(&TradeOrder {
                agent: self.name.clone(),
                signal: decision.action,
                quantity,
            })?;
            let trade_value = quantity * price;
            let fee = trade_value.abs() * self.transaction_fee;
            self.capital -= trade_value + fee;
            self.position += quantity;
            self.trades.push(ExecutedTrade {
                timestamp: now,
                signal: decision.action,
                price,
                quantity,
                fee,
            });
            debug!(
                agent = %self.name,
                signal = %decision.action,
                quantity,
                price,
                capital = self.capital,
                "trade executed"
            );
        }

        self.decisions.push(DecisionRecord {
            timestamp: now,
            price,
            quantity,
            executed,
        });
        Ok(())
    }

    /// capital + position * price
    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.capital + self.position * price
    }

    /// Largest peak-to-trough decline of the replayed portfolio value, as a
    /// fraction of the peak. 0.0 with fewer than two decisions.
    pub fn calculate_max_drawdown(&self) -> f64 {
        let mut records: Vec<&DecisionRecord> = self.decisions.iter().collect();
        records.sort_by_key(|r| r.timestamp);

        let mut capital = self.initial_capital;
        let mut position = 0.0;
        let mut values = Vec::with_capacity(records.len());
        for record in records {
            if record.executed {
                let trade_value = record.quantity * record.price;
                capital -= trade_value + trade_value.abs() * self.transaction_fee;
                position += record.quantity;
            }
            values.push(capital + position * record.price);
        }

        if values.len() < 2 {
            return 0.0;
        }

        let mut running_max = f64::NEG_INFINITY;
        let mut max_dd = 0.0_f64;
        for value in values {
            if value > running_max {
                running_max = value;
            }
            let dd = if running_max > 0.0 {
                (running_max - value) / running_max
            } else {
                0.0
            };
            max_dd = max_dd.max(dd);
        }
        max_dd
    }

    /// max(0, profit_factor * (1 - max_drawdown)), 0.0 before any executed trade.
    pub fn fitness(&self) -> f64 {
        let Some(last) = self.trades.last() else {
            return 0.0;
        };
        if self.initial_capital <= 0.0 {
            return 0.0;
        }

        let profit_factor = self.portfolio_value(last.price) / self.initial_capital;
        let risk_factor = 1.0 - self.calculate_max_drawdown();

        (profit_factor * risk_factor).max(0.0)
    }
}
