//! Key-time turning point — counter-trend entries at boundary tests, gated
//! on the key-time detector.
//!
//! The hypothesis: N hours after the event (or inside a fixed session
//! window), a test of a space boundary tends to turn. The gate fires at most
//! once per (space, offset) and per (rule, day), so the strategy cannot spam
//! entries across a window's every bar.

use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

use spacelab_core::domain::{Bar, Space, TradeAction};
use spacelab_core::engine::{OrderRequest, SpaceStrategy, StrategyContext};
use spacelab_core::pip::pip_size;

/// Key-time gated boundary-reversal strategy.
#[derive(Debug, Clone)]
pub struct KeyTimeTurningPointStrategy {
    /// How close (ratio of height) the close must sit to a boundary to count
    /// as a test of it.
    pub boundary_proximity_ratio: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
}

impl KeyTimeTurningPointStrategy {
    pub fn new(boundary_proximity_ratio: f64, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        assert!(
            (0.0..=0.5).contains(&boundary_proximity_ratio),
            "boundary_proximity_ratio must be in [0, 0.5]"
        );
        assert!(stop_loss_pips > 0.0, "stop_loss_pips must be positive");
        assert!(take_profit_pips > 0.0, "take_profit_pips must be positive");
        Self {
            boundary_proximity_ratio,
            stop_loss_pips,
            take_profit_pips,
        }
    }

    pub fn default_params() -> Self {
        Self::new(0.25, 15.0, 35.0)
    }
}

impl SpaceStrategy for KeyTimeTurningPointStrategy {
    fn name(&self) -> &str {
        "key_time_turning_point"
    }

    fn on_active_space(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        bar: &Bar,
        spaces: &mut [Space],
        idx: usize,
    ) {
        let Some(key_point) = ctx.is_key_time(&spaces[idx]) else {
            return;
        };
        let space = &mut spaces[idx];
        let Some(pip) = pip_size(&space.symbol) else {
            debug!(symbol = %space.symbol, "no pip size; turning-point stops inapplicable");
            return;
        };

        let proximity = self.boundary_proximity_ratio * space.height();
        let bearish_bar = bar.close < bar.open;
        let bullish_bar = bar.close > bar.open;

        // A reversal bar at the boundary at the key time → fade the test.
        let action = if (space.high - bar.close).abs() <= proximity && bearish_bar {
            Some(TradeAction::Sell)
        } else if (bar.close - space.low).abs() <= proximity && bullish_bar {
            Some(TradeAction::Buy)
        } else {
            None
        };

        let Some(action) = action else {
            debug!(
                space_id = %space.id,
                key_point = %key_point,
                close = bar.close,
                "key time reached but no turning-point pattern"
            );
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
            comment: format!("key-time turning point {:?}", action),
        });

        let metadata = HashMap::from([
            ("key_point".to_string(), json!(key_point.to_rfc3339())),
        ]);
        let symbol = space.symbol.clone();
        ctx.submit_signal("key_time_turning_point", &symbol, action, 1.0, metadata);
    }
}
