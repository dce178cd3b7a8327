//! Engine — owns the per-symbol active-space registry and drives the
//! event-driven lifecycle: events in, spaces created; bars in, invalidation
//! checks run, dead spaces pruned, survivors handed to the strategy hook;
//! resonance polled at the end of each cycle.
//!
//! Single-threaded by contract: the engine is invoked once per (symbol,
//! new-bar) by an external scheduler or backtest loop, and nothing here
//! blocks or suspends.

pub mod strategy;

pub use strategy::{OrderRequest, OrderSink, RecordingSink, SpaceStrategy, StrategyContext};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::SpaceLabConfig;
use crate::domain::{
    Bar, BarSeries, BrcState, EconomicEvent, InvalidationReason, OscillationState, Space, SpaceId,
    SpaceStatus, StrongBreakoutState,
};
use crate::keytime::KeyTimeDetector;
use crate::mapping::EventToSymbolMapper;
use crate::resonance::{ResonantSignal, SignalAggregator};
use crate::space::{boundary, invalidation};

/// The space lifecycle engine.
pub struct SpaceEngine {
    config: SpaceLabConfig,
    mapper: EventToSymbolMapper,
    key_times: KeyTimeDetector,
    aggregator: SignalAggregator,
    strategy: Box<dyn SpaceStrategy>,
    orders: Box<dyn OrderSink>,
    /// Per-symbol active spaces; exclusively owned here, never shared across
    /// symbols. Contains only `Active` entries after each bar pass.
    active: HashMap<String, Vec<Space>>,
    /// (event_id, symbol) pairs that already produced a space.
    created: HashSet<(String, String)>,
    last_signal_cleanup: Option<DateTime<Utc>>,
}

impl SpaceEngine {
    pub fn new(
        config: SpaceLabConfig,
        strategy: Box<dyn SpaceStrategy>,
        orders: Box<dyn OrderSink>,
    ) -> Self {
        let mapper = EventToSymbolMapper::new(config.event_mappings.clone());
        let aggregator = SignalAggregator::new(config.resonance.config.clone());
        Self {
            config,
            mapper,
            key_times: KeyTimeDetector::new(),
            aggregator,
            strategy,
            orders,
            active: HashMap::new(),
            created: HashSet::new(),
            last_signal_cleanup: None,
        }
    }

    pub fn config(&self) -> &SpaceLabConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &SignalAggregator {
        &self.aggregator
    }

    /// Active spaces for a symbol (empty when none).
    pub fn active_spaces(&self, symbol: &str) -> &[Space] {
        self.active.get(symbol).map_or(&[], Vec::as_slice)
    }

    pub fn total_active(&self) -> usize {
        self.active.values().map(Vec::len).sum()
    }

    /// Reset all run-scoped state: registry, duplicate guard, key-time
    /// triggers, aggregator store. Call at backtest/session start.
    pub fn new_run(&mut self) {
        self.active.clear();
        self.created.clear();
        self.key_times.reset();
        self.aggregator.reset();
        self.last_signal_cleanup = None;
        info!("engine state reset for new run");
    }

    /// Register an externally constructed space (tests, replay tooling).
    /// Normal creation goes through `process_events`.
    pub fn register_space(&mut self, space: Space) {
        self.created
            .insert((space.event_id.clone(), space.symbol.clone()));
        self.active
            .entry(space.symbol.clone())
            .or_default()
            .push(space);
    }

    /// Map newly arrived events and register the resulting spaces.
    ///
    /// One space per (event, symbol): a second opportunity for the same pair
    /// (another rule matching the same event) is skipped.
    pub fn process_events(
        &mut self,
        events: &[EconomicEvent],
        series_by_symbol: &HashMap<String, BarSeries>,
    ) {
        for event in events {
            let opportunities = self.mapper.map(event);
            if opportunities.is_empty() {
                debug!(event_id = %event.id, title = %event.title, "event mapped to no opportunity");
                continue;
            }
            for opportunity in opportunities {
                let key = (event.id.clone(), opportunity.symbol.clone());
                if self.created.contains(&key) {
                    debug!(
                        event_id = %event.id,
                        symbol = %opportunity.symbol,
                        "space already exists for this event+symbol; skipping"
                    );
                    continue;
                }
                let Some(series) = series_by_symbol.get(&opportunity.symbol) else {
                    warn!(
                        event_id = %event.id,
                        symbol = %opportunity.symbol,
                        "no price series for symbol; cannot create space"
                    );
                    continue;
                };
                let Some(bounds) = boundary::calculate(
                    &opportunity.symbol,
                    event.datetime,
                    series,
                    self.config.space.min_space_height_pips,
                    self.config.space.space_duration_minutes,
                ) else {
                    continue;
                };

                let space = Space {
                    id: SpaceId::derive(&event.id, &opportunity.symbol, bounds.bar_time),
                    event_id: event.id.clone(),
                    event_title: event.title.clone(),
                    symbol: opportunity.symbol.clone(),
                    suggested_direction: Some(opportunity.suggested_direction),
                    high: bounds.high,
                    low: bounds.low,
                    height_pips: bounds.height_pips,
                    creation_time: Some(bounds.bar_time),
                    event_time: event.datetime,
                    valid_until: bounds.valid_until,
                    status: SpaceStatus::Active,
                    strong_breakout: StrongBreakoutState::default(),
                    oscillation: OscillationState::default(),
                    brc: BrcState::default(),
                    scratch: HashMap::new(),
                };
                info!(
                    space_id = %space.id,
                    event_id = %event.id,
                    symbol = %space.symbol,
                    rule_id = %opportunity.rule_id,
                    high = space.high,
                    low = space.low,
                    height_pips = space.height_pips,
                    valid_until = %space.valid_until,
                    "space created"
                );
                self.active
                    .entry(opportunity.symbol.clone())
                    .or_default()
                    .push(space);
                self.created.insert(key);
            }
        }
    }

    /// Full per-bar cycle for one symbol: invalidate, prune, dispatch the
    /// strategy hook, poll resonance.
    pub fn process_bar(&mut self, bar: &Bar, now: DateTime<Utc>) {
        self.invalidate_and_prune(bar, now);
        self.dispatch_hooks(bar, now);
        self.poll_resonance(now);
    }

    /// One engine cycle over all symbols: (a) invalidation on existing
    /// spaces, (b) new-event registration, (c) strategy hooks, then the
    /// resonance poll.
    pub fn process_cycle(
        &mut self,
        now: DateTime<Utc>,
        events: &[EconomicEvent],
        bars: &[Bar],
        series_by_symbol: &HashMap<String, BarSeries>,
    ) {
        for bar in bars {
            self.invalidate_and_prune(bar, now);
        }
        self.process_events(events, series_by_symbol);
        for bar in bars {
            self.dispatch_hooks(bar, now);
        }
        self.poll_resonance(now);
    }

    fn invalidate_and_prune(&mut self, bar: &Bar, now: DateTime<Utc>) {
        let Some(spaces) = self.active.get_mut(&bar.symbol) else {
            return;
        };
        for space in spaces.iter_mut() {
            let Some(creation_time) = space.creation_time else {
                warn!(
                    space_id = %space.id,
                    symbol = %space.symbol,
                    "space has no creation time; marking inactive"
                );
                space.invalidate(InvalidationReason::MissingCreationTime);
                continue;
            };
            // Bars inside the formation window carry no new information.
            if bar.timestamp <= creation_time {
                continue;
            }
            invalidation::check(space, bar, now, &self.config.invalidation);
        }

        let before = spaces.len();
        spaces.retain(Space::is_active);
        let pruned = before - spaces.len();
        if pruned > 0 {
            debug!(symbol = %bar.symbol, pruned, remaining = spaces.len(), "pruned inactive spaces");
        }
        if spaces.is_empty() {
            self.active.remove(&bar.symbol);
        }
    }

    fn dispatch_hooks(&mut self, bar: &Bar, now: DateTime<Utc>) {
        let Some(mut spaces) = self.active.remove(&bar.symbol) else {
            return;
        };
        for idx in 0..spaces.len() {
            let skip = match spaces[idx].creation_time {
                Some(creation_time) => bar.timestamp <= creation_time,
                None => true,
            };
            if skip {
                continue;
            }
            let mut ctx = StrategyContext {
                config: &self.config,
                orders: &mut *self.orders,
                signals: &mut self.aggregator,
                key_times: &mut self.key_times,
                now,
            };
            self.strategy.on_active_space(&mut ctx, bar, &mut spaces, idx);
        }
        spaces.retain(Space::is_active);
        if !spaces.is_empty() {
            self.active.insert(bar.symbol.clone(), spaces);
        }
    }

    fn poll_resonance(&mut self, now: DateTime<Utc>) {
        if !self.config.resonance.enabled {
            return;
        }
        let resonant: Vec<(String, ResonantSignal)> =
            self.aggregator.check_resonance(now).into_iter().collect();
        for (symbol, signal) in resonant {
            self.apply_resonance(&symbol, &signal, now);
        }

        // Prune the aggregator store at most once per day of engine time.
        match self.last_signal_cleanup {
            None => self.last_signal_cleanup = Some(now),
            Some(last) if now - last >= Duration::hours(24) => {
                self.aggregator.clean_old_signals(now);
                self.last_signal_cleanup = Some(now);
            }
            _ => {}
        }
    }

    /// Attach the resonance record to direction-matching active spaces and
    /// notify the strategy.
    fn apply_resonance(&mut self, symbol: &str, signal: &ResonantSignal, now: DateTime<Utc>) {
        let Some(spaces) = self.active.get_mut(symbol) else {
            debug!(symbol, action = ?signal.action, "resonance without active spaces; skipping");
            return;
        };

        let mut matched = false;
        for space in spaces.iter_mut() {
            if space.suggested_direction != Some(signal.action) {
                continue;
            }
            matched = true;
            let record = json!({
                "action": signal.action,
                "weight": signal.weight,
                "strategies": signal.strategies,
                "timestamp": now.to_rfc3339(),
            });
            let log = space
                .scratch
                .entry("resonance_signals".to_string())
                .or_insert_with(|| json!([]));
            if let Some(entries) = log.as_array_mut() {
                entries.push(record);
            }
            info!(
                symbol,
                space_id = %space.id,
                action = ?signal.action,
                weight = signal.weight,
                "resonance applied to space"
            );
        }

        if !matched {
            debug!(symbol, action = ?signal.action, "no direction-matching active spaces for resonance");
            return;
        }

        let mut ctx = StrategyContext {
            config: &self.config,
            orders: &mut *self.orders,
            signals: &mut self.aggregator,
            key_times: &mut self.key_times,
            now,
        };
        self.strategy.on_resonance(&mut ctx, symbol, signal, spaces);
    }
}
