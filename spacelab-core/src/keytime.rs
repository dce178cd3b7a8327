//! Key-time detection — bar timestamps of special interest to a strategy.
//!
//! Two independent trigger families:
//! - event-relative: N hours after a space's creation, matched within a
//!   ±30-minute window because bar granularity rarely lands on the exact
//!   arithmetic offset;
//! - fixed daily windows in a named timezone (e.g. the London open),
//!   idempotent per calendar day.
//!
//! Both are at-most-once: an internal fired-trigger set ensures one firing
//! per (space, offset) and per (space, rule, day). The detector is owned by
//! the engine and reset at the start of every run — a leaked singleton here
//! would bleed trigger state across backtests.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::domain::{Space, SpaceId};

/// Half-width of the event-relative matching window.
const EVENT_OFFSET_TOLERANCE_MINUTES: i64 = 30;

/// A fixed daily key-time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedKeyTimeRule {
    /// Local wall-clock start, "HH:MM".
    pub start: String,
    /// Local wall-clock end, "HH:MM".
    pub end: String,
    /// IANA timezone name; unknown names fall back to UTC with a warning.
    #[serde(default = "default_tz")]
    pub tz: String,
    /// Allowed weekdays, 0 = Monday .. 6 = Sunday. `None` allows every day.
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
}

fn default_tz() -> String {
    "UTC".to_string()
}

impl FixedKeyTimeRule {
    fn describe(&self) -> String {
        format!("{}-{}_{}", self.start, self.end, self.tz)
    }

    fn parse_times(&self) -> Option<(NaiveTime, NaiveTime)> {
        let start = parse_hhmm(&self.start)?;
        let end = parse_hhmm(&self.end)?;
        if end < start {
            warn!(rule = %self.describe(), "fixed key-time window is inverted; skipping rule");
            return None;
        }
        Some((start, end))
    }

    fn timezone(&self) -> Tz {
        self.tz.parse::<Tz>().unwrap_or_else(|_| {
            warn!(tz = %self.tz, "unknown timezone in fixed key-time rule; using UTC");
            Tz::UTC
        })
    }
}

fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let time = NaiveTime::parse_from_str(raw, "%H:%M").ok();
    if time.is_none() {
        warn!(raw, "unparsable HH:MM time in fixed key-time rule");
    }
    time
}

/// Unique key for an already-fired trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TriggerKey {
    EventOffset {
        space: SpaceId,
        symbol: String,
        hours: u32,
    },
    FixedWindow {
        space: SpaceId,
        symbol: String,
        rule: String,
        date: NaiveDate,
    },
}

/// Stateful key-time detector. One instance per run, owned by the engine.
#[derive(Debug, Default)]
pub struct KeyTimeDetector {
    fired: HashSet<TriggerKey>,
}

impl KeyTimeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all fired-trigger state (new run / new backtest session).
    pub fn reset(&mut self) {
        self.fired.clear();
    }

    /// Check whether `current_time_utc` is a key time for `space`.
    ///
    /// Returns the key point (event-relative offset time, or the fixed
    /// window's UTC start) the first time each trigger matches, `None` on
    /// every later call for the same trigger.
    pub fn is_key_time(
        &mut self,
        current_time_utc: DateTime<Utc>,
        space: &Space,
        hours_after_event: &[u32],
        fixed_windows: &[FixedKeyTimeRule],
    ) -> Option<DateTime<Utc>> {
        if let Some(key_point) = self.check_event_offsets(current_time_utc, space, hours_after_event) {
            return Some(key_point);
        }
        self.check_fixed_windows(current_time_utc, space, fixed_windows)
    }

    fn check_event_offsets(
        &mut self,
        current_time_utc: DateTime<Utc>,
        space: &Space,
        hours_after_event: &[u32],
    ) -> Option<DateTime<Utc>> {
        let creation_time = space.creation_time?;
        for &hours in hours_after_event {
            let key_point = creation_time + Duration::hours(i64::from(hours));
            let diff = (current_time_utc - key_point).num_minutes().abs();
            if diff > EVENT_OFFSET_TOLERANCE_MINUTES {
                continue;
            }
            let key = TriggerKey::EventOffset {
                space: space.id.clone(),
                symbol: space.symbol.clone(),
                hours,
            };
            if self.fired.insert(key) {
                info!(
                    space_id = %space.id,
                    symbol = %space.symbol,
                    hours,
                    key_point = %key_point,
                    "key time: event offset triggered"
                );
                return Some(key_point);
            }
        }
        None
    }

    fn check_fixed_windows(
        &mut self,
        current_time_utc: DateTime<Utc>,
        space: &Space,
        fixed_windows: &[FixedKeyTimeRule],
    ) -> Option<DateTime<Utc>> {
        for rule in fixed_windows {
            let Some((start_time, end_time)) = rule.parse_times() else {
                continue;
            };
            let tz = rule.timezone();
            let local = current_time_utc.with_timezone(&tz);

            if let Some(days) = &rule.days_of_week {
                let weekday = local.weekday().num_days_from_monday() as u8;
                if !days.contains(&weekday) {
                    continue;
                }
            }

            let local_date = local.date_naive();
            // DST gaps can make a wall-clock time nonexistent; skip that day.
            let Some(utc_start) = local_date
                .and_time(start_time)
                .and_local_timezone(tz)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
            else {
                warn!(rule = %rule.describe(), date = %local_date, "window start unrepresentable in timezone");
                continue;
            };
            let Some(utc_end) = local_date
                .and_time(end_time)
                .and_local_timezone(tz)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
            else {
                continue;
            };

            if current_time_utc < utc_start || current_time_utc > utc_end {
                continue;
            }

            let key = TriggerKey::FixedWindow {
                space: space.id.clone(),
                symbol: space.symbol.clone(),
                rule: rule.describe(),
                date: current_time_utc.date_naive(),
            };
            if self.fired.insert(key) {
                info!(
                    space_id = %space.id,
                    symbol = %space.symbol,
                    rule = %rule.describe(),
                    window_start = %utc_start,
                    "key time: fixed window triggered"
                );
                return Some(utc_start);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BrcState, OscillationState, SpaceStatus, StrongBreakoutState, TradeAction,
    };
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn space_created_at(creation: DateTime<Utc>) -> Space {
        Space {
            id: SpaceId::derive("ev", "EURUSD", creation),
            event_id: "ev".into(),
            event_title: "CPI".into(),
            symbol: "EURUSD".into(),
            suggested_direction: Some(TradeAction::Buy),
            high: 1.1010,
            low: 1.1000,
            height_pips: 10.0,
            creation_time: Some(creation),
            event_time: creation,
            valid_until: creation + Duration::hours(8),
            status: SpaceStatus::Active,
            strong_breakout: StrongBreakoutState::default(),
            oscillation: OscillationState::default(),
            brc: BrcState::default(),
            scratch: HashMap::new(),
        }
    }

    #[test]
    fn event_offset_fires_within_tolerance() {
        let creation = Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();

        // 2h05m after creation is within ±30min of the 2h offset
        let now = creation + Duration::minutes(125);
        let key = detector.is_key_time(now, &space, &[2], &[]).unwrap();
        assert_eq!(key, creation + Duration::hours(2));
    }

    #[test]
    fn event_offset_fires_at_most_once() {
        let creation = Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();

        let t1 = creation + Duration::minutes(95);
        let t2 = creation + Duration::minutes(110);
        let t3 = creation + Duration::minutes(125);
        assert!(detector.is_key_time(t1, &space, &[2], &[]).is_some());
        assert!(detector.is_key_time(t2, &space, &[2], &[]).is_none());
        assert!(detector.is_key_time(t3, &space, &[2], &[]).is_none());
    }

    #[test]
    fn event_offset_outside_tolerance_is_silent() {
        let creation = Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let now = creation + Duration::minutes(61); // 59min short of the 2h point
        assert!(detector.is_key_time(now, &space, &[2], &[]).is_none());
    }

    #[test]
    fn separate_offsets_fire_independently() {
        let creation = Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        assert!(detector
            .is_key_time(creation + Duration::hours(1), &space, &[1, 3], &[])
            .is_some());
        assert!(detector
            .is_key_time(creation + Duration::hours(3), &space, &[1, 3], &[])
            .is_some());
    }

    #[test]
    fn reset_rearms_triggers() {
        let creation = Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let now = creation + Duration::hours(2);
        assert!(detector.is_key_time(now, &space, &[2], &[]).is_some());
        detector.reset();
        assert!(detector.is_key_time(now, &space, &[2], &[]).is_some());
    }

    #[test]
    fn fixed_window_fires_in_named_timezone() {
        // 2024-07-01 is a Monday; 08:30 London (BST) == 07:30 UTC
        let creation = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let rule = FixedKeyTimeRule {
            start: "08:00".into(),
            end: "09:00".into(),
            tz: "Europe/London".into(),
            days_of_week: Some(vec![0, 1, 2, 3, 4]),
        };
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 7, 30, 0).unwrap();
        let key = detector.is_key_time(now, &space, &[], &[rule]).unwrap();
        assert_eq!(key, Utc.with_ymd_and_hms(2024, 7, 1, 7, 0, 0).unwrap());
    }

    #[test]
    fn fixed_window_idempotent_per_day() {
        let creation = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let rule = FixedKeyTimeRule {
            start: "08:00".into(),
            end: "09:00".into(),
            tz: "Europe/London".into(),
            days_of_week: None,
        };
        let t1 = Utc.with_ymd_and_hms(2024, 7, 1, 7, 15, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 7, 1, 7, 45, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 7, 2, 7, 15, 0).unwrap();
        assert!(detector.is_key_time(t1, &space, &[], std::slice::from_ref(&rule)).is_some());
        assert!(detector.is_key_time(t2, &space, &[], std::slice::from_ref(&rule)).is_none());
        assert!(detector.is_key_time(next_day, &space, &[], &[rule]).is_some());
    }

    #[test]
    fn fixed_window_respects_weekday_filter() {
        // 2024-07-06 is a Saturday
        let creation = Utc.with_ymd_and_hms(2024, 7, 6, 0, 0, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let rule = FixedKeyTimeRule {
            start: "08:00".into(),
            end: "09:00".into(),
            tz: "UTC".into(),
            days_of_week: Some(vec![0, 1, 2, 3, 4]),
        };
        let now = Utc.with_ymd_and_hms(2024, 7, 6, 8, 30, 0).unwrap();
        assert!(detector.is_key_time(now, &space, &[], &[rule]).is_none());
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let creation = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let rule = FixedKeyTimeRule {
            start: "08:00".into(),
            end: "09:00".into(),
            tz: "Mars/Olympus".into(),
            days_of_week: None,
        };
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 30, 0).unwrap();
        let key = detector.is_key_time(now, &space, &[], &[rule]).unwrap();
        assert_eq!(key, Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn malformed_rule_is_skipped() {
        let creation = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let space = space_created_at(creation);
        let mut detector = KeyTimeDetector::new();
        let bad = FixedKeyTimeRule {
            start: "8am".into(),
            end: "09:00".into(),
            tz: "UTC".into(),
            days_of_week: None,
        };
        let inverted = FixedKeyTimeRule {
            start: "10:00".into(),
            end: "09:00".into(),
            tz: "UTC".into(),
            days_of_week: None,
        };
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 30, 0).unwrap();
        assert!(detector.is_key_time(now, &space, &[], &[bad, inverted]).is_none());
    }
}
