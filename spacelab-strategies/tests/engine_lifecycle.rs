//! End-to-end engine runs: event ingestion, space creation, strategy
//! decisions, invalidation, pruning, and cross-strategy resonance.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spacelab_core::config::SpaceLabConfig;
use spacelab_core::domain::{Bar, BarSeries, EconomicEvent, TradeAction};
use spacelab_core::engine::{OrderRequest, OrderSink, SpaceEngine};
use spacelab_core::mapping::{
    EventMappingRule, OutcomeCondition, ReactionDirection, SymbolReaction,
};
use spacelab_strategies::{
    SpaceBreakoutStrategy, SpaceTimeResonanceStrategy, StrategySuite,
};

/// Order sink shared between the engine and the test body.
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<OrderRequest>>>);

impl SharedSink {
    fn orders(&self) -> Vec<OrderRequest> {
        self.0.borrow().clone()
    }
}

impl OrderSink for SharedSink {
    fn place_order(&mut self, request: OrderRequest) {
        self.0.borrow_mut().push(request);
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 8, 13, 30, 0).unwrap()
}

fn bar(offset_minutes: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: t0() + Duration::minutes(offset_minutes),
        symbol: "EURUSD".into(),
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

fn nfp_event() -> EconomicEvent {
    EconomicEvent {
        id: "nfp-2024-03".into(),
        title: "Non-Farm Payrolls".into(),
        country_code: "US".into(),
        datetime: t0(),
        actual: Some("275K".into()),
        forecast: Some("200K".into()),
        previous: Some("229K".into()),
    }
}

/// Rule mapping a good NFP print to a EURUSD buy (direction chosen so the
/// breakout scenarios below agree with the space's suggested direction).
fn config_with_rule() -> SpaceLabConfig {
    let mut config = SpaceLabConfig::default();
    config.event_mappings = vec![EventMappingRule {
        id: "us_nfp_eurusd".into(),
        country_codes: vec!["US".into()],
        title_keywords: vec!["payrolls".into()],
        outcome_is_good_condition: OutcomeCondition::ActualGtForecast,
        symbols_and_reactions: vec![SymbolReaction {
            symbol: "EURUSD".into(),
            direction_if_good: ReactionDirection::Buy,
            direction_if_bad: ReactionDirection::Sell,
        }],
    }];
    // keep spaces alive long enough for the multi-bar scenarios
    config.space.space_duration_minutes = 240;
    config
}

fn event_series() -> HashMap<String, BarSeries> {
    // the event bar: 12-pip initial pulse
    let mut map = HashMap::new();
    map.insert(
        "EURUSD".to_string(),
        BarSeries::from_bars(vec![bar(0, 1.1004, 1.1012, 1.1000, 1.1008)]),
    );
    map
}

#[test]
fn breakout_entry_then_strong_breakout_invalidation() {
    let sink = SharedSink::default();
    let mut engine = SpaceEngine::new(
        config_with_rule(),
        Box::new(SpaceBreakoutStrategy::default_params()),
        Box::new(sink.clone()),
    );
    engine.new_run();

    engine.process_events(&[nfp_event()], &event_series());
    assert_eq!(engine.total_active(), 1);
    let space = &engine.active_spaces("EURUSD")[0];
    assert_eq!(space.high, 1.1012);
    assert_eq!(space.low, 1.1000);
    assert_eq!(space.suggested_direction, Some(TradeAction::Buy));

    // bar 1: close one pip beyond the high + buffer -> breakout entry
    let b1 = bar(30, 1.1008, 1.1016, 1.1006, 1.1015);
    engine.process_bar(&b1, b1.timestamp);
    let orders = sink.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].action, TradeAction::Buy);
    assert_eq!(engine.total_active(), 1);

    // bars 2-4: closes far beyond 2x height hold outside for three bars ->
    // strong breakout confirms and the space is pruned
    for i in 0..3 {
        let b = bar(
            60 + 30 * i,
            1.1040,
            1.1046,
            1.1036,
            1.1042,
        );
        engine.process_bar(&b, b.timestamp);
    }
    assert_eq!(engine.total_active(), 0);
    // the scratch flag kept the strategy from re-entering on later bars
    assert_eq!(sink.orders().len(), 1);
}

#[test]
fn duration_expiry_prunes_without_price_action() {
    let sink = SharedSink::default();
    let mut engine = SpaceEngine::new(
        config_with_rule(),
        Box::new(SpaceBreakoutStrategy::default_params()),
        Box::new(sink.clone()),
    );
    engine.new_run();
    engine.process_events(&[nfp_event()], &event_series());
    assert_eq!(engine.total_active(), 1);

    // quiet mid-space bar: space survives
    let quiet = bar(30, 1.1006, 1.1008, 1.1004, 1.1006);
    engine.process_bar(&quiet, quiet.timestamp);
    assert_eq!(engine.total_active(), 1);

    // first bar past valid_until (240 minutes) retires it
    let late = bar(241, 1.1006, 1.1008, 1.1004, 1.1006);
    engine.process_bar(&late, late.timestamp);
    assert_eq!(engine.total_active(), 0);
    assert!(sink.orders().is_empty());
}

#[test]
fn oscillation_exhausts_a_whipsawing_space() {
    let mut config = config_with_rule();
    config.invalidation.oscillation_m_times = 4;
    let sink = SharedSink::default();
    let mut engine = SpaceEngine::new(
        config,
        Box::new(SpaceBreakoutStrategy::default_params()),
        Box::new(sink.clone()),
    );
    engine.new_run();
    engine.process_events(&[nfp_event()], &event_series());

    // closes alternate above and below the space: two crossings per flip
    let closes: [f64; 4] = [1.1014, 1.0996, 1.1014, 1.0996];
    let mut remaining = engine.total_active();
    for (i, close) in closes.iter().enumerate() {
        let b = bar(
            30 + 30 * i as i64,
            1.1006,
            close.max(1.1006) + 0.0002,
            close.min(1.1006) - 0.0002,
            *close,
        );
        engine.process_bar(&b, b.timestamp);
        remaining = engine.total_active();
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0);
}

#[test]
fn cross_strategy_resonance_places_amplified_order() {
    let mut config = config_with_rule();
    config
        .resonance
        .config
        .strategy_weights
        .insert("space_breakout".into(), 1.2);
    config
        .resonance
        .config
        .strategy_weights
        .insert("space_time_resonance".into(), 1.0);

    let sink = SharedSink::default();
    let suite = StrategySuite::new()
        .with(Box::new(SpaceBreakoutStrategy::default_params()))
        .with(Box::new(SpaceTimeResonanceStrategy::default_params()));
    let mut engine = SpaceEngine::new(config, Box::new(suite), Box::new(sink.clone()));
    engine.new_run();
    engine.process_events(&[nfp_event()], &event_series());

    // one breakout bar: space_breakout submits a 1.2-weight BUY and places
    // its entry; space_time_resonance submits a 0.9-weight BUY. Summed
    // weight 2.1 clears the 2.0 threshold, so the engine's resonance pass
    // fires on the same cycle and the resonance strategy places its
    // amplified order at the boundary.
    let b1 = bar(30, 1.1008, 1.1016, 1.1006, 1.1015);
    engine.process_bar(&b1, b1.timestamp);

    let orders = sink.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].comment, "space breakout Buy");
    assert!(orders[1].comment.starts_with("resonance Buy"));
    assert_eq!(orders[1].price, 1.1012);

    // the engine recorded the resonance on the space's scratch log
    let space = &engine.active_spaces("EURUSD")[0];
    let log = space.scratch["resonance_signals"].as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["action"], serde_json::json!("BUY"));
}

#[test]
fn process_cycle_runs_prune_register_hooks_in_order() {
    let sink = SharedSink::default();
    let mut engine = SpaceEngine::new(
        config_with_rule(),
        Box::new(SpaceBreakoutStrategy::default_params()),
        Box::new(sink.clone()),
    );
    engine.new_run();

    // cycle 1: the event arrives with its reaction bar; the space is
    // registered but the creation-time bar itself is skipped by the hooks
    let series = event_series();
    let b0 = bar(0, 1.1004, 1.1012, 1.1000, 1.1008);
    engine.process_cycle(b0.timestamp, &[nfp_event()], std::slice::from_ref(&b0), &series);
    assert_eq!(engine.total_active(), 1);
    assert!(sink.orders().is_empty());

    // cycle 2: no new events; the breakout bar reaches the hook
    let b1 = bar(30, 1.1008, 1.1016, 1.1006, 1.1015);
    engine.process_cycle(b1.timestamp, &[], std::slice::from_ref(&b1), &series);
    assert_eq!(sink.orders().len(), 1);
}
