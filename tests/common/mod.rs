#![allow(dead_code)]

use chrono::{NaiveDateTime, TimeDelta};
use evotrader::domain::error::EvotraderError;
use evotrader::domain::interval::Interval;
pub use evotrader::domain::ohlcv::OhlcvBar;
use evotrader::domain::ohlcv::parse_timestamp;
use evotrader::domain::strategy::{Decision, StrategySnapshot, TradeAction, TradingStrategy};
use evotrader::ports::exchange_port::{Exchange, TradeOrder};
use rand::RngCore;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub struct MockExchange {
    pub bars: Vec<OhlcvBar>,
    pub prices: HashMap<NaiveDateTime, f64>,
    pub orders: Vec<TradeOrder>,
    pub reject_trades: bool,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            prices: HashMap::new(),
            orders: Vec::new(),
            reject_trades: false,
        }
    }

    pub fn with_bars(mut self, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        self.bars = bars;
        self
    }

    /// Price override; takes precedence over bar closes.
    pub fn with_price(mut self, at: NaiveDateTime, price: f64) -> Self {
        self.prices.insert(at, price);
        self
    }

    pub fn rejecting_trades(mut self) -> Self {
        self.reject_trades = true;
        self
    }
}

impl Exchange for MockExchange {
    fn get_market_data(
        &self,
        now: NaiveDateTime,
        max_history_count: usize,
        _interval: Interval,
    ) -> Result<Vec<OhlcvBar>, EvotraderError> {
        let upto: Vec<OhlcvBar> = self
            .bars
            .iter()
            .filter(|b| b.timestamp <= now)
            .cloned()
            .collect();
        let skip = upto.len().saturating_sub(max_history_count);
        Ok(upto[skip..].to_vec())
    }

    fn get_current_price(&self, now: NaiveDateTime) -> Result<f64, EvotraderError> {
        if let Some(price) = self.prices.get(&now) {
            return Ok(*price);
        }
        self.bars
            .iter()
            .find(|b| b.timestamp == now)
            .map(|b| b.close)
            .ok_or(EvotraderError::PriceUnavailable { timestamp: now })
    }

    fn execute_trade(&mut self, order: &TradeOrder) -> Result<(), EvotraderError> {
        if self.reject_trades {
            return Err(EvotraderError::Data {
                reason: "exchange rejected order".into(),
            });
        }
        self.orders.push(order.clone());
        Ok(())
    }
}

/// Replays queued decisions, then holds.
pub struct MockStrategy {
    pub queue: RefCell<VecDeque<Decision>>,
    pub calls: Cell<usize>,
}

impl MockStrategy {
    pub fn new(decisions: &[(TradeAction, f64)]) -> Self {
        Self {
            queue: RefCell::new(
                decisions
                    .iter()
                    .map(|&(action, confidence)| Decision::new(action, confidence))
                    .collect(),
            ),
            calls: Cell::new(0),
        }
    }

    pub fn always(action: TradeAction, confidence: f64, times: usize) -> Self {
        Self::new(&vec![(action, confidence); times])
    }
}

impl TradingStrategy for MockStrategy {
    fn decide(&self, _window: &[OhlcvBar]) -> Result<Decision, EvotraderError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self
            .queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Decision::new(TradeAction::Hold, 0.0)))
    }

    fn mutate(
        &mut self,
        _mutation_rate: f64,
        _rng: &mut dyn RngCore,
    ) -> Result<(), EvotraderError> {
        Ok(())
    }

    fn snapshot(&self) -> StrategySnapshot {
        StrategySnapshot {
            kind: "mock".into(),
            coeffs: Vec::new(),
            gamma: 0.0,
            threshold: 0.0,
            window_size: 1,
        }
    }
}

pub fn ts(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

pub fn make_bar(at: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(at),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

/// Hourly bars with a repeating up/down pattern around `start_price`.
pub fn generate_bars(start: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let start = ts(start);
    (0..count)
        .map(|i| {
            let drift = (i % 6) as f64 - (i % 4) as f64 * 0.5;
            let open = start_price + drift;
            let close = open + if i % 3 == 0 { -0.75 } else { 1.25 };
            OhlcvBar {
                timestamp: start + TimeDelta::hours(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 100.0 + (i % 5) as f64 * 20.0,
            }
        })
        .collect()
}

pub fn bars_to_csv(bars: &[OhlcvBar]) -> String {
    let mut csv = String::from("timestamp,Open,High,Low,Close,Volume\n");
    for b in bars {
        writeln!(
            csv,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
    csv
}

pub fn write_csv(dir: &Path, name: &str, bars: &[OhlcvBar]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bars_to_csv(bars)).unwrap();
    path
}
