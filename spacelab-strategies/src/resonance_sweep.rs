//! Space-time resonance — harvest boundary interactions as signals and act
//! only when several strategies agree.
//!
//! This strategy never trades on its own signals. It feeds the aggregator
//! on every boundary break and waits for the engine's resonance callback;
//! when cross-strategy consensus arrives for a direction-matching space, it
//! places one amplified order per space.

use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

use spacelab_core::domain::{Bar, Space, TradeAction};
use spacelab_core::engine::{OrderRequest, SpaceStrategy, StrategyContext};
use spacelab_core::pip::pip_size;
use spacelab_core::resonance::ResonantSignal;

const SIGNAL_SENT_UP_KEY: &str = "resonance_signal_sent_up";
const SIGNAL_SENT_DOWN_KEY: &str = "resonance_signal_sent_down";
const ORDER_PLACED_KEY: &str = "resonance_order_placed";

/// Resonance-driven strategy.
#[derive(Debug, Clone)]
pub struct SpaceTimeResonanceStrategy {
    /// Confidence attached to harvested boundary signals.
    pub signal_confidence: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
}

impl SpaceTimeResonanceStrategy {
    pub fn new(signal_confidence: f64, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&signal_confidence),
            "signal_confidence must be in [0, 1]"
        );
        assert!(stop_loss_pips > 0.0, "stop_loss_pips must be positive");
        assert!(take_profit_pips > 0.0, "take_profit_pips must be positive");
        Self {
            signal_confidence,
            stop_loss_pips,
            take_profit_pips,
        }
    }

    pub fn default_params() -> Self {
        Self::new(0.9, 20.0, 40.0)
    }
}

impl SpaceStrategy for SpaceTimeResonanceStrategy {
    fn name(&self) -> &str {
        "space_time_resonance"
    }

    fn on_active_space(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        bar: &Bar,
        spaces: &mut [Space],
        idx: usize,
    ) {
        let space = &mut spaces[idx];

        // Harvest one signal per boundary break direction per space.
        let (action, flag) = if bar.close > space.high {
            (TradeAction::Buy, SIGNAL_SENT_UP_KEY)
        } else if bar.close < space.low {
            (TradeAction::Sell, SIGNAL_SENT_DOWN_KEY)
        } else {
            return;
        };
        if space.scratch.contains_key(flag) {
            return;
        }
        space.scratch.insert(flag.into(), json!(true));

        let metadata = HashMap::from([
            ("space_high".to_string(), json!(space.high)),
            ("space_low".to_string(), json!(space.low)),
            ("close".to_string(), json!(bar.close)),
        ]);
        let symbol = space.symbol.clone();
        debug!(symbol = %symbol, ?action, "boundary break harvested as signal");
        ctx.submit_signal(
            "space_time_resonance",
            &symbol,
            action,
            self.signal_confidence,
            metadata,
        );
    }

    fn on_resonance(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        symbol: &str,
        signal: &ResonantSignal,
        spaces: &mut [Space],
    ) {
        let Some(pip) = pip_size(symbol) else {
            debug!(symbol, "no pip size; resonance stops inapplicable");
            return;
        };

        for space in spaces.iter_mut() {
            if space.suggested_direction != Some(signal.action) {
                continue;
            }
            if space.scratch.contains_key(ORDER_PLACED_KEY) {
                continue;
            }
            // Anchor the entry at the boundary in the resonance direction.
            let price = match signal.action {
                TradeAction::Buy => space.high,
                TradeAction::Sell => space.low,
            };
            let (stop_loss, take_profit) = match signal.action {
                TradeAction::Buy => (
                    price - self.stop_loss_pips * pip,
                    price + self.take_profit_pips * pip,
                ),
                TradeAction::Sell => (
                    price + self.stop_loss_pips * pip,
                    price - self.take_profit_pips * pip,
                ),
            };
            info!(
                symbol,
                space_id = %space.id,
                action = ?signal.action,
                weight = signal.weight,
                strategies = ?signal.strategies,
                "placing resonance-amplified order"
            );
            ctx.orders.place_order(OrderRequest {
                symbol: symbol.to_string(),
                action: signal.action,
                price,
                stop_loss: Some(stop_loss),
                take_profit: Some(take_profit),
                space_id: space.id.clone(),
                comment: format!(
                    "resonance {:?} w={:.2} [{}]",
                    signal.action,
                    signal.weight,
                    signal.strategies.join(",")
                ),
            });
            space.scratch.insert(ORDER_PLACED_KEY.into(), json!(true));
        }
    }
}
