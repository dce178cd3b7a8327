//! Cross-strategy signal aggregation and resonance detection.
//!
//! Strategies submit (symbol, action, confidence) signals as they fire; the
//! aggregator weights each by its strategy's configured weight and reports a
//! symbol as resonant when one side's summed weight inside the rolling window
//! clears the threshold AND beats the opposite side. Signals are immutable
//! after submission; cleanup only removes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::domain::{StrategySignal, TradeAction};

/// Aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceConfig {
    /// Per-strategy weights; unlisted strategies get `default_strategy_weight`.
    #[serde(default)]
    pub strategy_weights: HashMap<String, f64>,
    #[serde(default = "default_strategy_weight")]
    pub default_strategy_weight: f64,
    #[serde(default = "default_window_minutes")]
    pub resonance_time_window_minutes: i64,
    #[serde(default = "default_threshold")]
    pub resonance_threshold: f64,
    #[serde(default = "default_retain_hours")]
    pub signal_retain_hours: i64,
}

fn default_strategy_weight() -> f64 {
    0.7
}
fn default_window_minutes() -> i64 {
    120
}
fn default_threshold() -> f64 {
    2.0
}
fn default_retain_hours() -> i64 {
    48
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            strategy_weights: HashMap::new(),
            default_strategy_weight: default_strategy_weight(),
            resonance_time_window_minutes: default_window_minutes(),
            resonance_threshold: default_threshold(),
            signal_retain_hours: default_retain_hours(),
        }
    }
}

/// A resonant (symbol, action) report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonantSignal {
    pub action: TradeAction,
    pub weight: f64,
    /// Distinct strategy names contributing inside the window.
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct SymbolSignals {
    buy: Vec<StrategySignal>,
    sell: Vec<StrategySignal>,
}

impl SymbolSignals {
    fn side_mut(&mut self, action: TradeAction) -> &mut Vec<StrategySignal> {
        match action {
            TradeAction::Buy => &mut self.buy,
            TradeAction::Sell => &mut self.sell,
        }
    }

    fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }
}

/// Collects signals from concurrently-running strategies and computes
/// weighted cross-strategy resonance.
#[derive(Debug, Default)]
pub struct SignalAggregator {
    config: ResonanceConfig,
    signals: HashMap<String, SymbolSignals>,
}

impl SignalAggregator {
    pub fn new(config: ResonanceConfig) -> Self {
        Self {
            config,
            signals: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ResonanceConfig {
        &self.config
    }

    /// Drop every stored signal (new run / new backtest session).
    pub fn reset(&mut self) {
        self.signals.clear();
    }

    /// Submit one signal. Confidence is clamped to [0, 1]; the stored weight
    /// is `strategy_weight * confidence`.
    pub fn submit(
        &mut self,
        strategy_name: &str,
        symbol: &str,
        action: TradeAction,
        timestamp: DateTime<Utc>,
        confidence: f64,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        let confidence = if (0.0..=1.0).contains(&confidence) {
            confidence
        } else {
            warn!(strategy_name, symbol, confidence, "confidence outside [0,1]; clamping");
            confidence.clamp(0.0, 1.0)
        };

        let strategy_weight = self
            .config
            .strategy_weights
            .get(strategy_name)
            .copied()
            .unwrap_or(self.config.default_strategy_weight);
        let weight = strategy_weight * confidence;

        let signal = StrategySignal {
            strategy_name: strategy_name.to_string(),
            symbol: symbol.to_string(),
            action,
            timestamp,
            weight,
            metadata,
        };
        debug!(strategy_name, symbol, ?action, weight, "signal submitted");
        self.signals
            .entry(symbol.to_string())
            .or_default()
            .side_mut(action)
            .push(signal);
    }

    /// Weighted resonance check over the rolling window ending at `now`.
    pub fn check_resonance(&self, now: DateTime<Utc>) -> HashMap<String, ResonantSignal> {
        let window = Duration::minutes(self.config.resonance_time_window_minutes);
        let mut resonant = HashMap::new();

        for (symbol, sides) in &self.signals {
            let in_window = |s: &&StrategySignal| (now - s.timestamp) <= window;
            let buy: Vec<&StrategySignal> = sides.buy.iter().filter(in_window).collect();
            let sell: Vec<&StrategySignal> = sides.sell.iter().filter(in_window).collect();

            let buy_weight: f64 = buy.iter().map(|s| s.weight).sum();
            let sell_weight: f64 = sell.iter().map(|s| s.weight).sum();

            let (action, weight, contributors) =
                if buy_weight >= self.config.resonance_threshold && buy_weight > sell_weight {
                    (TradeAction::Buy, buy_weight, buy)
                } else if sell_weight >= self.config.resonance_threshold && sell_weight > buy_weight {
                    (TradeAction::Sell, sell_weight, sell)
                } else {
                    continue;
                };

            let mut strategies: Vec<String> = contributors
                .iter()
                .map(|s| s.strategy_name.clone())
                .collect();
            strategies.sort();
            strategies.dedup();

            info!(symbol = %symbol, ?action, weight, ?strategies, "resonance detected");
            resonant.insert(
                symbol.clone(),
                ResonantSignal {
                    action,
                    weight,
                    strategies,
                },
            );
        }
        resonant
    }

    /// Prune signals older than the retain window; symbols left with no
    /// signals are removed entirely.
    pub fn clean_old_signals(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(self.config.signal_retain_hours);
        self.signals.retain(|symbol, sides| {
            let before = sides.buy.len() + sides.sell.len();
            sides.buy.retain(|s| s.timestamp >= cutoff);
            sides.sell.retain(|s| s.timestamp >= cutoff);
            let removed = before - (sides.buy.len() + sides.sell.len());
            if removed > 0 {
                debug!(symbol = %symbol, removed, "pruned expired signals");
            }
            !sides.is_empty()
        });
    }

    /// Signals for one symbol, optionally restricted to a window ending at `now`.
    pub fn signals_for_symbol(
        &self,
        symbol: &str,
        window_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> (Vec<&StrategySignal>, Vec<&StrategySignal>) {
        let Some(sides) = self.signals.get(symbol) else {
            return (Vec::new(), Vec::new());
        };
        match window_minutes {
            None => (sides.buy.iter().collect(), sides.sell.iter().collect()),
            Some(minutes) => {
                let window = Duration::minutes(minutes);
                let keep = |s: &&StrategySignal| (now - s.timestamp) <= window;
                (
                    sides.buy.iter().filter(keep).collect(),
                    sides.sell.iter().filter(keep).collect(),
                )
            }
        }
    }

    pub fn total_signals(&self) -> usize {
        self.signals
            .values()
            .map(|s| s.buy.len() + s.sell.len())
            .sum()
    }
}
