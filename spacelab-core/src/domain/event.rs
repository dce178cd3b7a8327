//! Economic calendar event — consumed, never owned.
//!
//! Events arrive from the calendar-ingestion subsystem with heterogeneous
//! `actual`/`forecast`/`previous` strings ("250K", "3.4%", "-0.1M", "1,850").
//! Parsing is best-effort: an unparsable value is `None`, never an error,
//! because a single malformed calendar field must not take down a rule or
//! the per-bar loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One economic-calendar event, already normalized to UTC upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub id: String,
    pub title: String,
    /// ISO-ish country code as published by the calendar ("US", "EU", "GB"...).
    pub country_code: String,
    pub datetime: DateTime<Utc>,
    pub actual: Option<String>,
    pub forecast: Option<String>,
    pub previous: Option<String>,
}

impl EconomicEvent {
    pub fn actual_value(&self) -> Option<f64> {
        self.actual.as_deref().and_then(parse_indicator_value)
    }

    pub fn forecast_value(&self) -> Option<f64> {
        self.forecast.as_deref().and_then(parse_indicator_value)
    }

    pub fn previous_value(&self) -> Option<f64> {
        self.previous.as_deref().and_then(parse_indicator_value)
    }
}

/// Parse a calendar indicator value, tolerating `%`, `K`, `M` suffixes and
/// thousands separators. `"3.4%"` -> 0.034, `"250K"` -> 250_000, `"1,850"`
/// -> 1850. Returns `None` for anything that does not parse cleanly.
pub fn parse_indicator_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = trimmed.replace(',', "");
    let upper = cleaned.to_ascii_uppercase();

    if let Some(stripped) = upper.strip_suffix('%') {
        return stripped.trim().parse::<f64>().ok().map(|v| v / 100.0);
    }
    if let Some(stripped) = upper.strip_suffix('K') {
        return stripped.trim().parse::<f64>().ok().map(|v| v * 1_000.0);
    }
    if let Some(stripped) = upper.strip_suffix('M') {
        return stripped.trim().parse::<f64>().ok().map(|v| v * 1_000_000.0);
    }
    cleaned.parse::<f64>().ok()
}
