//! Strategy signals — the units the cross-strategy aggregator collects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Directional trade intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn opposite(self) -> Self {
        match self {
            TradeAction::Buy => TradeAction::Sell,
            TradeAction::Sell => TradeAction::Buy,
        }
    }
}

/// A signal submitted by one strategy for one symbol.
///
/// Immutable once created: the aggregator only ever appends and prunes,
/// never edits. `weight` is already the product of the configured strategy
/// weight and the submission confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy_name: String,
    pub symbol: String,
    pub action: TradeAction,
    pub timestamp: DateTime<Utc>,
    pub weight: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}
