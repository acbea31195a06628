//! OHLCV bar representation.
//!
//! A market window is a plain `&[OhlcvBar]` ordered oldest to newest.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Arithmetic mean of the window's volume, `None` for an empty window.
pub fn mean_volume(window: &[OhlcvBar]) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    let total: f64 = window.iter().map(|b| b.volume).sum();
    Some(total / window.len() as f64)
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}
