//! CSV-backed exchange over a single asset's OHLCV history.
//!
//! Bars are served at file resolution; the interval argument of
//! `get_market_data` is accepted but does not resample.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::error::EvotraderError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::{OhlcvBar, parse_timestamp};
use crate::ports::exchange_port::{AgentActivity, Exchange, TradeOrder};

const TIMESTAMP_HEADERS: [&str; 4] = ["timestamp", "datetime", "date", "time"];

pub struct CsvExchange {
    bars: Vec<OhlcvBar>,
    activity: BTreeMap<String, AgentActivity>,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

fn column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize, EvotraderError> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        .ok_or_else(|| EvotraderError::Data {
            reason: format!("missing {} column", names[0]),
        })
}

fn field(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, EvotraderError> {
    let raw = record.get(index).ok_or_else(|| EvotraderError::Data {
        reason: format!("line {}: missing {} value", line, name),
    })?;
    raw.trim().parse().map_err(|e| EvotraderError::Data {
        reason: format!("line {}: invalid {} value '{}': {}", line, name, raw, e),
    })
}

impl CsvExchange {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EvotraderError> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|e| EvotraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_reader(content.as_slice())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EvotraderError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| EvotraderError::Data {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let columns = Columns {
            timestamp: column(&headers, &TIMESTAMP_HEADERS)?,
            open: column(&headers, &["open"])?,
            high: column(&headers, &["high"])?,
            low: column(&headers, &["low"])?,
            close: column(&headers, &["close"])?,
            volume: column(&headers, &["volume"])?,
        };

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| EvotraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let raw_ts = record.get(columns.timestamp).unwrap_or("");
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| EvotraderError::Data {
                reason: format!("line {}: invalid timestamp '{}'", line, raw_ts),
            })?;

            bars.push(OhlcvBar {
                timestamp,
                open: field(&record, columns.open, "open", line)?,
                high: field(&record, columns.high, "high", line)?,
                low: field(&record, columns.low, "low", line)?,
                close: field(&record, columns.close, "close", line)?,
                volume: field(&record, columns.volume, "volume", line)?,
            });
        }

        Ok(Self::from_bars(bars))
    }

    pub fn from_bars(mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            bars,
            activity: BTreeMap::new(),
        }
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// First and last timestamp, `None` for an empty file.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((self.bars.first()?.timestamp, self.bars.last()?.timestamp))
    }
}

impl Exchange for CsvExchange {
    fn get_market_data(
        &self,
        now: NaiveDateTime,
        max_history_count: usize,
        _interval: Interval,
    ) -> Result<Vec<OhlcvBar>, EvotraderError> {
        let end = self.bars.partition_point(|b| b.timestamp <= now);
        let begin = end.saturating_sub(max_history_count);
        Ok(self.bars[begin..end].to_vec())
    }

    fn get_current_price(&self, now: NaiveDateTime) -> Result<f64, EvotraderError> {
        let i = self.bars.partition_point(|b| b.timestamp < now);
        match self.bars.get(i) {
            Some(bar) if bar.timestamp == now => Ok(bar.close),
            _ => Err(EvotraderError::PriceUnavailable { timestamp: now }),
        }
    }

    fn execute_trade(&mut self, order: &TradeOrder) -> Result<(), EvotraderError> {
        self.activity
            .entry(order.agent.clone())
            .or_default()
            .record(order);
        Ok(())
    }

    fn get_performance(&self) -> BTreeMap<String, AgentActivity> {
        self.activity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::TradeAction;
    use tempfile::TempDir;

    const HOURLY: &str = "Timestamp,Open,High,Low,Close,Volume\n\
        2024-01-15 02:00:00,102.0,104.0,101.0,103.0,700\n\
        2024-01-15 00:00:00,100.0,110.0,90.0,105.0,500\n\
        2024-01-15 01:00:00,105.0,115.0,100.0,110.0,600\n";

    fn at(hour: u32) -> NaiveDateTime {
        parse_timestamp(&format!("2024-01-15 {:02}:00:00", hour)).unwrap()
    }

    fn exchange() -> CsvExchange {
        CsvExchange::from_reader(HOURLY.as_bytes()).unwrap()
    }

    #[test]
    fn loads_and_sorts_bars() {
        let exchange = exchange();
        assert_eq!(exchange.bar_count(), 3);
        assert_eq!(exchange.bars()[0].timestamp, at(0));
        assert_eq!(exchange.bars()[0].open, 100.0);
        assert_eq!(exchange.bars()[0].high, 110.0);
        assert_eq!(exchange.bars()[0].low, 90.0);
        assert_eq!(exchange.bars()[0].close, 105.0);
        assert_eq!(exchange.bars()[0].volume, 500.0);
        assert_eq!(exchange.time_range(), Some((at(0), at(2))));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("btc_hourly.csv");
        fs::write(&path, HOURLY).unwrap();

        let exchange = CsvExchange::from_path(&path).unwrap();
        assert_eq!(exchange.bar_count(), 3);
    }

    #[test]
    fn missing_file_is_data_error() {
        let dir = TempDir::new().unwrap();
        let result = CsvExchange::from_path(dir.path().join("absent.csv"));
        assert!(matches!(result, Err(EvotraderError::Data { .. })));
    }

    #[test]
    fn market_data_is_capped_and_inclusive() {
        let exchange = exchange();
        let window = exchange.get_market_data(at(1), 10, Interval::Hour).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].timestamp, at(1));

        let window = exchange.get_market_data(at(2), 2, Interval::Hour).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].timestamp, at(1));
    }

    #[test]
    fn market_data_before_history_is_empty() {
        let exchange = exchange();
        let early = parse_timestamp("2024-01-14 23:00:00").unwrap();
        assert!(exchange.get_market_data(early, 10, Interval::Hour).unwrap().is_empty());
    }

    #[test]
    fn price_requires_exact_timestamp() {
        let exchange = exchange();
        assert_eq!(exchange.get_current_price(at(1)).unwrap(), 110.0);

        let between = parse_timestamp("2024-01-15 01:30:00").unwrap();
        assert!(matches!(
            exchange.get_current_price(between),
            Err(EvotraderError::PriceUnavailable { .. })
        ));
    }

    #[test]
    fn date_only_rows_and_lowercase_headers() {
        let csv = "date,open,high,low,close,volume\n2024-01-15,1,2,0.5,1.5,10\n";
        let exchange = CsvExchange::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(exchange.bars()[0].timestamp, at(0));
    }

    #[test]
    fn missing_column_fails() {
        let csv = "timestamp,open,high,low,close\n2024-01-15,1,2,0.5,1.5\n";
        let err = CsvExchange::from_reader(csv.as_bytes()).err().unwrap();
        assert_eq!(err.to_string(), "market data error: missing volume column");
    }

    #[test]
    fn bad_value_names_the_line() {
        let csv = "timestamp,open,high,low,close,volume\n2024-01-15,1,2,oops,1.5,10\n";
        let err = CsvExchange::from_reader(csv.as_bytes()).err().unwrap();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("low"));
    }

    #[test]
    fn trades_are_tallied_per_agent() {
        let mut exchange = exchange();
        for (agent, quantity) in [("a", 1.0), ("b", -2.0), ("a", -0.25)] {
            exchange
                .execute_trade(&TradeOrder {
                    agent: agent.to_string(),
                    signal: if quantity > 0.0 {
                        TradeAction::Long
                    } else {
                        TradeAction::Short
                    },
                    quantity,
                })
                .unwrap();
        }
        let performance = exchange.get_performance();
        assert_eq!(performance["a"].trades, 2);
        assert_eq!(performance["a"].net_quantity, 0.75);
        assert_eq!(performance["b"].gross_quantity, 2.0);
    }
}
