//! BarSeries — an ordered-by-time bar container for one (symbol, timeframe).
//!
//! The engine only ever needs two lookups: the bar at or immediately before a
//! timestamp (forward-fill semantics, for locating an event's reaction bar),
//! and a bounded lookback window ending at a timestamp. Both are binary
//! searches over a sorted Vec; no DataFrame machinery is required.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::bar::Bar;

/// Time-ordered bar storage for a single symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self { bars: Vec::new() }
    }

    /// Build a series from bars, sorting by timestamp.
    pub fn from_bars(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self { bars }
    }

    /// Append a bar. Out-of-order timestamps are dropped with a warning —
    /// the upstream feed promises time-aligned delivery, so a violation is
    /// a data problem to surface, not a reason to abort the run.
    pub fn push(&mut self, bar: Bar) {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                warn!(
                    symbol = %bar.symbol,
                    bar_time = %bar.timestamp,
                    last_time = %last.timestamp,
                    "dropping out-of-order bar"
                );
                return;
            }
        }
        self.bars.push(bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The bar whose timestamp equals `ts`, else the nearest preceding bar.
    /// `None` when `ts` precedes the series start.
    pub fn at_or_before(&self, ts: DateTime<Utc>) -> Option<&Bar> {
        match self.bars.binary_search_by_key(&ts, |b| b.timestamp) {
            Ok(idx) => Some(&self.bars[idx]),
            Err(0) => None,
            Err(idx) => Some(&self.bars[idx - 1]),
        }
    }

    /// Up to `n` bars ending at the bar at/before `ts` (inclusive), oldest first.
    pub fn lookback(&self, ts: DateTime<Utc>, n: usize) -> &[Bar] {
        let end = match self.bars.binary_search_by_key(&ts, |b| b.timestamp) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        let start = end.saturating_sub(n);
        &self.bars[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(minute: u32) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 12, minute, 0).unwrap(),
            symbol: "EURUSD".into(),
            open: 1.1,
            high: 1.101,
            low: 1.099,
            close: 1.1005,
            volume: 100.0,
        }
    }

    fn series() -> BarSeries {
        BarSeries::from_bars(vec![bar_at(0), bar_at(30), bar_at(59)])
    }

    #[test]
    fn at_or_before_exact_match() {
        let s = series();
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap();
        assert_eq!(s.at_or_before(ts).unwrap().timestamp, ts);
    }

    #[test]
    fn at_or_before_forward_fills() {
        let s = series();
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 12, 45, 0).unwrap();
        let bar = s.at_or_before(ts).unwrap();
        assert_eq!(bar.timestamp, Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap());
    }

    #[test]
    fn at_or_before_none_before_start() {
        let s = series();
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 11, 0, 0).unwrap();
        assert!(s.at_or_before(ts).is_none());
    }

    #[test]
    fn lookback_window_bounded() {
        let s = series();
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 12, 59, 0).unwrap();
        let window = s.lookback(ts, 2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap());
    }

    #[test]
    fn push_rejects_out_of_order() {
        let mut s = series();
        s.push(bar_at(10)); // before the last bar at :59
        assert_eq!(s.len(), 3);
        s.push(bar_at(59)); // duplicate timestamp
        assert_eq!(s.len(), 3);
    }
}
