//! Property tests for the space lifecycle invariants.
//!
//! - the oscillation crossing counter never decreases;
//! - a space's status transition is monotonic: once inactive, nothing a
//!   later bar does changes the reason or re-activates it;
//! - the boundary calculator never produces a space below the height floor.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;

use spacelab_core::domain::{
    Bar, BarSeries, BrcState, OscillationState, Space, SpaceId, SpaceStatus, StrongBreakoutState,
};
use spacelab_core::space::{boundary, check, InvalidationConfig};

fn creation_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap()
}

fn make_space() -> Space {
    let creation = creation_time();
    Space {
        id: SpaceId::derive("prop", "EURUSD", creation),
        event_id: "prop".into(),
        event_title: "Property Event".into(),
        symbol: "EURUSD".into(),
        suggested_direction: None,
        high: 1.1010,
        low: 1.1000,
        height_pips: 10.0,
        creation_time: Some(creation),
        event_time: creation,
        valid_until: creation + Duration::hours(12),
        status: SpaceStatus::Active,
        strong_breakout: StrongBreakoutState::default(),
        oscillation: OscillationState::default(),
        brc: BrcState::default(),
        scratch: HashMap::new(),
    }
}

fn bar_from_close(index: usize, close: f64) -> Bar {
    Bar {
        timestamp: creation_time() + Duration::minutes(30 * (index as i64 + 1)),
        symbol: "EURUSD".into(),
        open: close,
        high: close + 0.0002,
        low: close - 0.0002,
        close,
        volume: 1000.0,
    }
}

fn close_seq() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0960..1.1050_f64, 1..60)
}

proptest! {
    #[test]
    fn oscillation_counter_is_monotone(closes in close_seq()) {
        let config = InvalidationConfig {
            strong_breakout_n_bars: u32::MAX,
            oscillation_m_times: u32::MAX,
            retrace_confirmation_buffer_ratio: 0.25,
        };
        let mut space = make_space();
        let mut previous = 0u32;
        for (i, close) in closes.iter().enumerate() {
            let bar = bar_from_close(i, *close);
            check(&mut space, &bar, bar.timestamp, &config);
            prop_assert!(space.oscillation.crossings >= previous);
            previous = space.oscillation.crossings;
        }
    }

    #[test]
    fn invalidated_space_never_changes(closes in close_seq()) {
        let config = InvalidationConfig::default();
        let mut space = make_space();
        let mut terminal: Option<SpaceStatus> = None;
        for (i, close) in closes.iter().enumerate() {
            let bar = bar_from_close(i, *close);
            check(&mut space, &bar, bar.timestamp, &config);
            match terminal {
                None => {
                    if !space.is_active() {
                        terminal = Some(space.status);
                    }
                }
                Some(status) => {
                    prop_assert_eq!(space.status, status);
                }
            }
        }
    }

    #[test]
    fn boundary_respects_height_floor(
        low in 1.0900..1.1000_f64,
        range_pips in 0.0..40.0_f64,
        min_height in 1.0..20.0_f64,
    ) {
        let t0 = creation_time();
        let high = low + range_pips * 0.0001;
        let series = BarSeries::from_bars(vec![Bar {
            timestamp: t0,
            symbol: "EURUSD".into(),
            open: low,
            high,
            low,
            close: high,
            volume: 1000.0,
        }]);
        match boundary::calculate("EURUSD", t0, &series, min_height, 60) {
            Some(bounds) => {
                prop_assert!(bounds.height_pips >= min_height);
                prop_assert!(bounds.high > bounds.low);
            }
            None => {
                prop_assert!(range_pips < min_height + 1e-6);
            }
        }
    }
}
