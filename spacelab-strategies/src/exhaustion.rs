//! Exhaustion — fade a failed test of a space boundary.
//!
//! Bearish exhaustion: the bar probes above `space.high` but closes back
//! inside by at least `reversal_ratio` of the space height → sell toward the
//! interior. Bullish exhaustion mirrors it at `space.low`. One fade per
//! space per direction; every fade also feeds the signal aggregator.

use std::collections::HashMap;

use serde_json::json;
use tracing::debug;

use spacelab_core::domain::{Bar, Space, TradeAction};
use spacelab_core::engine::{OrderRequest, SpaceStrategy, StrategyContext};
use spacelab_core::pip::pip_size;

const FADED_UP_KEY: &str = "exhaustion_faded_upper";
const FADED_DOWN_KEY: &str = "exhaustion_faded_lower";

/// Boundary-exhaustion fade strategy.
#[derive(Debug, Clone)]
pub struct ExhaustionStrategy {
    /// How far back inside (as a ratio of height) the close must reject.
    pub reversal_ratio: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
    /// Confidence attached to submitted signals.
    pub signal_confidence: f64,
}

impl ExhaustionStrategy {
    pub fn new(reversal_ratio: f64, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&reversal_ratio),
            "reversal_ratio must be in [0, 1]"
        );
        assert!(stop_loss_pips > 0.0, "stop_loss_pips must be positive");
        assert!(take_profit_pips > 0.0, "take_profit_pips must be positive");
        Self {
            reversal_ratio,
            stop_loss_pips,
            take_profit_pips,
            signal_confidence: 0.8,
        }
    }

    pub fn default_params() -> Self {
        Self::new(0.3, 15.0, 30.0)
    }
}

impl SpaceStrategy for ExhaustionStrategy {
    fn name(&self) -> &str {
        "exhaustion"
    }

    fn on_active_space(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        bar: &Bar,
        spaces: &mut [Space],
        idx: usize,
    ) {
        let space = &mut spaces[idx];
        let Some(pip) = pip_size(&space.symbol) else {
            debug!(symbol = %space.symbol, "no pip size; exhaustion stops inapplicable");
            return;
        };
        let height = space.height();
        let reject_depth = self.reversal_ratio * height;

        // Bearish exhaustion at the upper boundary.
        let bearish = bar.high >= space.high
            && bar.close < space.high - reject_depth
            && bar.close > space.low;
        // Bullish exhaustion at the lower boundary.
        let bullish = bar.low <= space.low
            && bar.close > space.low + reject_depth
            && bar.close < space.high;

        let (action, flag) = if bearish && !space.scratch.contains_key(FADED_UP_KEY) {
            (TradeAction::Sell, FADED_UP_KEY)
        } else if bullish && !space.scratch.contains_key(FADED_DOWN_KEY) {
            (TradeAction::Buy, FADED_DOWN_KEY)
        } else {
            return;
        };

        let (stop_loss, take_profit) = match action {
            TradeAction::Sell => (
                bar.close + self.stop_loss_pips * pip,
                bar.close - self.take_profit_pips * pip,
            ),
            TradeAction::Buy => (
                bar.close - self.stop_loss_pips * pip,
                bar.close + self.take_profit_pips * pip,
            ),
        };

        ctx.orders.place_order(OrderRequest {
            symbol: space.symbol.clone(),
            action,
            price: bar.close,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            space_id: space.id.clone(),
            comment: format!("boundary exhaustion {:?}", action),
        });
        space.scratch.insert(flag.into(), json!(true));

        let metadata = HashMap::from([
            ("boundary".to_string(), json!(if action == TradeAction::Sell { space.high } else { space.low })),
            ("probe_extreme".to_string(), json!(if action == TradeAction::Sell { bar.high } else { bar.low })),
        ]);
        let symbol = space.symbol.clone();
        ctx.submit_signal("exhaustion", &symbol, action, self.signal_confidence, metadata);
    }
}
