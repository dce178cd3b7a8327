//! Space boundary calculation — derives a price range from the bar that
//! absorbed an event's initial market reaction.
//!
//! The model: the single bar at (or forward-filled to just before) the event
//! timestamp IS the initial pulse; its high/low become the space boundaries.
//! Ranges shorter than the configured height floor are rejected, as are
//! symbols whose pip size cannot be resolved (the floor is pip-denominated).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::BarSeries;
use crate::pip::pip_size;

/// Boundaries of a freshly qualified space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceBoundaries {
    pub high: f64,
    pub low: f64,
    pub height_pips: f64,
    /// Timestamp of the qualifying bar — becomes the space's creation time.
    pub bar_time: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Derive space boundaries for `symbol` from the event's reaction bar.
///
/// Returns `None` (logged, not fatal) when the series has no bar at or
/// before the event time, when the pip size is unresolvable, or when the
/// range is below `min_space_height_pips`.
pub fn calculate(
    symbol: &str,
    event_time_utc: DateTime<Utc>,
    series: &BarSeries,
    min_space_height_pips: f64,
    space_duration_minutes: i64,
) -> Option<SpaceBoundaries> {
    let bar = match series.at_or_before(event_time_utc) {
        Some(bar) => bar,
        None => {
            warn!(
                symbol,
                event_time = %event_time_utc,
                "no bar at or before event time; cannot determine initial move"
            );
            return None;
        }
    };

    let pip = match pip_size(symbol) {
        Some(pip) => pip,
        None => {
            warn!(symbol, "pip size unresolvable; cannot validate space height");
            return None;
        }
    };

    let height_pips = (bar.high - bar.low) / pip;
    if height_pips < min_space_height_pips {
        debug!(
            symbol,
            height_pips,
            min_space_height_pips,
            bar_time = %bar.timestamp,
            "space height below floor; space not created"
        );
        return None;
    }

    Some(SpaceBoundaries {
        high: bar.high,
        low: bar.low,
        height_pips,
        bar_time: bar.timestamp,
        valid_until: bar.timestamp + Duration::minutes(space_duration_minutes),
    })
}
