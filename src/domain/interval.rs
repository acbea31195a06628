//! Bar intervals and the discretized simulation time axis.

use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Minute,
    Hour,
    Day,
}

impl Interval {
    /// Fixed duration of one tick.
    pub fn tick(self) -> TimeDelta {
        match self {
            Interval::Minute => TimeDelta::minutes(1),
            Interval::Hour => TimeDelta::hours(1),
            Interval::Day => TimeDelta::days(1),
        }
    }

    /// Uniform axis over `[start, end)` stepping by one tick.
    pub fn time_axis(self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
        let step = self.tick();
        let mut times = Vec::new();
        let mut t = start;
        while t < end {
            times.push(t);
            t += step;
        }
        times
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Minute => write!(f, "minute"),
            Interval::Hour => write!(f, "hour"),
            Interval::Day => write!(f, "day"),
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minute" | "1m" => Ok(Interval::Minute),
            "hour" | "1h" => Ok(Interval::Hour),
            "day" | "1d" => Ok(Interval::Day),
            other => Err(format!("unknown interval '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn tick_durations() {
        assert_eq!(Interval::Minute.tick(), TimeDelta::seconds(60));
        assert_eq!(Interval::Hour.tick(), TimeDelta::seconds(3600));
        assert_eq!(Interval::Day.tick(), TimeDelta::seconds(86_400));
    }

    #[test]
    fn hourly_axis_is_half_open() {
        let axis = Interval::Hour.time_axis(at(1, 0), at(2, 0));
        assert_eq!(axis.len(), 24);
        assert_eq!(axis[0], at(1, 0));
        assert_eq!(axis[23], at(1, 23));
    }

    #[test]
    fn daily_axis() {
        let axis = Interval::Day.time_axis(at(1, 0), at(8, 0));
        assert_eq!(axis.len(), 7);
        assert_eq!(axis[6], at(7, 0));
    }

    #[test]
    fn empty_axis_when_end_not_after_start() {
        assert!(Interval::Minute.time_axis(at(2, 0), at(1, 0)).is_empty());
        assert!(Interval::Minute.time_axis(at(1, 0), at(1, 0)).is_empty());
    }

    #[test]
    fn parse_and_display_roundtrip() {
        for interval in [Interval::Minute, Interval::Hour, Interval::Day] {
            assert_eq!(interval.to_string().parse::<Interval>(), Ok(interval));
        }
        assert_eq!("HOUR".parse::<Interval>(), Ok(Interval::Hour));
        assert!("week".parse::<Interval>().is_err());
    }
}
