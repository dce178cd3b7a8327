//! CSV ingest — bar series and economic-calendar exports.
//!
//! The upstream subsystems (market-data sync, calendar scraper) publish
//! plain CSV; these loaders turn them into core types. Malformed rows are
//! skipped with a warning — one bad calendar line must not sink a run —
//! while unreadable files and missing headers are hard errors.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::domain::{Bar, BarSeries, EconomicEvent};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: String, column: String },
}

/// Parse a timestamp as RFC 3339 or naive `%Y-%m-%d %H:%M:%S` (treated as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn require_column(headers: &csv::StringRecord, name: &str, path: &str) -> Result<usize, IngestError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| IngestError::MissingColumn {
            path: path.to_string(),
            column: name.to_string(),
        })
}

/// Load a bar series for `symbol` from a CSV with columns
/// `time,open,high,low,close,volume`.
pub fn load_bars_csv(path: impl AsRef<Path>, symbol: &str) -> Result<BarSeries, IngestError> {
    let path_str = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| {
        if matches!(e.kind(), csv::ErrorKind::Io(_)) {
            IngestError::Open {
                path: path_str.clone(),
                source: std::io::Error::other(e.to_string()),
            }
        } else {
            IngestError::Csv {
                path: path_str.clone(),
                source: e,
            }
        }
    })?;

    let headers = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            path: path_str.clone(),
            source: e,
        })?
        .clone();
    let time_idx = require_column(&headers, "time", &path_str)?;
    let open_idx = require_column(&headers, "open", &path_str)?;
    let high_idx = require_column(&headers, "high", &path_str)?;
    let low_idx = require_column(&headers, "low", &path_str)?;
    let close_idx = require_column(&headers, "close", &path_str)?;
    let volume_idx = require_column(&headers, "volume", &path_str)?;

    let mut bars = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path_str, line, error = %e, "skipping unreadable bar row");
                continue;
            }
        };
        let parsed = (|| {
            let timestamp = parse_timestamp(record.get(time_idx)?)?;
            Some(Bar {
                timestamp,
                symbol: symbol.to_string(),
                open: record.get(open_idx)?.trim().parse().ok()?,
                high: record.get(high_idx)?.trim().parse().ok()?,
                low: record.get(low_idx)?.trim().parse().ok()?,
                close: record.get(close_idx)?.trim().parse().ok()?,
                volume: record.get(volume_idx)?.trim().parse().ok()?,
            })
        })();
        match parsed {
            Some(bar) if bar.is_sane() => bars.push(bar),
            Some(bar) => {
                warn!(path = %path_str, line, time = %bar.timestamp, "skipping insane OHLC row");
            }
            None => {
                warn!(path = %path_str, line, "skipping unparsable bar row");
            }
        }
    }
    Ok(BarSeries::from_bars(bars))
}

/// Load calendar events from a CSV with columns
/// `id,datetime,country_code,title,actual,forecast,previous`.
pub fn load_calendar_csv(path: impl AsRef<Path>) -> Result<Vec<EconomicEvent>, IngestError> {
    let path_str = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| {
        if matches!(e.kind(), csv::ErrorKind::Io(_)) {
            IngestError::Open {
                path: path_str.clone(),
                source: std::io::Error::other(e.to_string()),
            }
        } else {
            IngestError::Csv {
                path: path_str.clone(),
                source: e,
            }
        }
    })?;

    let headers = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            path: path_str.clone(),
            source: e,
        })?
        .clone();
    let id_idx = require_column(&headers, "id", &path_str)?;
    let datetime_idx = require_column(&headers, "datetime", &path_str)?;
    let country_idx = require_column(&headers, "country_code", &path_str)?;
    let title_idx = require_column(&headers, "title", &path_str)?;
    let actual_idx = require_column(&headers, "actual", &path_str)?;
    let forecast_idx = require_column(&headers, "forecast", &path_str)?;
    let previous_idx = require_column(&headers, "previous", &path_str)?;

    let optional = |record: &csv::StringRecord, idx: usize| -> Option<String> {
        record
            .get(idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut events = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path_str, line, error = %e, "skipping unreadable event row");
                continue;
            }
        };
        let Some(datetime) = record.get(datetime_idx).and_then(parse_timestamp) else {
            warn!(path = %path_str, line, "skipping event row with unparsable datetime");
            continue;
        };
        let (Some(id), Some(country_code), Some(title)) = (
            optional(&record, id_idx),
            optional(&record, country_idx),
            optional(&record, title_idx),
        ) else {
            warn!(path = %path_str, line, "skipping event row with missing id/country/title");
            continue;
        };
        events.push(EconomicEvent {
            id,
            title,
            country_code,
            datetime,
            actual: optional(&record, actual_idx),
            forecast: optional(&record, forecast_idx),
            previous: optional(&record, previous_idx),
        });
    }
    Ok(events)
}
