//! Strategy seam — the decision hook the engine drives, and the order sink
//! it hands strategies for execution.
//!
//! Strategies never own the space registry: they receive the full active
//! slice for the symbol each bar and are free to mutate scratch fields on
//! the space under evaluation (marking a retrace entry as placed, logging a
//! resonance hit). Order placement goes through `OrderSink`, the only seam
//! to the execution engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::SpaceLabConfig;
use crate::domain::{Bar, Space, SpaceId, TradeAction};
use crate::keytime::KeyTimeDetector;
use crate::resonance::{ResonantSignal, SignalAggregator};

/// An order request handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub action: TradeAction,
    /// Reference price at decision time (usually the bar close).
    pub price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// The space that motivated the order.
    pub space_id: SpaceId,
    pub comment: String,
}

/// Execution seam. The backtest or live engine behind it is out of scope;
/// the core only promises to call this from the single evaluation thread.
pub trait OrderSink {
    fn place_order(&mut self, request: OrderRequest);
}

/// Order sink that records every request. The default for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub orders: Vec<OrderRequest>,
}

impl OrderSink for RecordingSink {
    fn place_order(&mut self, request: OrderRequest) {
        self.orders.push(request);
    }
}

/// Everything a decision hook may touch besides the spaces themselves.
pub struct StrategyContext<'a> {
    pub config: &'a SpaceLabConfig,
    pub orders: &'a mut dyn OrderSink,
    pub signals: &'a mut SignalAggregator,
    pub key_times: &'a mut KeyTimeDetector,
    pub now: DateTime<Utc>,
}

impl StrategyContext<'_> {
    /// Key-time gate for a space, using the configured offsets and windows.
    pub fn is_key_time(&mut self, space: &Space) -> Option<DateTime<Utc>> {
        self.key_times.is_key_time(
            self.now,
            space,
            &self.config.key_time.hours_after_event,
            &self.config.key_time.fixed_windows,
        )
    }

    /// Submit a signal to the aggregator under this context's timestamp.
    pub fn submit_signal(
        &mut self,
        strategy_name: &str,
        symbol: &str,
        action: TradeAction,
        confidence: f64,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        self.signals
            .submit(strategy_name, symbol, action, self.now, confidence, metadata);
    }
}

/// The strategy-specific decision hook.
///
/// `spaces[idx]` is the space under evaluation; the rest of the slice are
/// its still-active peers for the same symbol. Implementations may mutate
/// scratch fields, place orders, and submit signals; they must not flip a
/// space's status (the invalidation machine owns it).
pub trait SpaceStrategy {
    /// Human-readable name; also the aggregator weight lookup key.
    fn name(&self) -> &str;

    /// Called once per still-active space per bar, after invalidation checks.
    fn on_active_space(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        bar: &Bar,
        spaces: &mut [Space],
        idx: usize,
    );

    /// Called when the aggregator reports resonance on a symbol with active
    /// spaces. Default: no reaction.
    fn on_resonance(
        &mut self,
        _ctx: &mut StrategyContext<'_>,
        _symbol: &str,
        _signal: &ResonantSignal,
        _spaces: &mut [Space],
    ) {
    }
}
