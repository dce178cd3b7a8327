//! Space-edge breakout — trade in the direction of a close beyond a boundary.
//!
//! A close beyond `boundary ± breakout_buffer_pips` places one order per
//! space in the breakout direction, stop on the far side of the space,
//! target a fixed multiple of the buffer. The scratch flag guards against
//! re-entry on every subsequent outside close.

use std::collections::HashMap;

use serde_json::json;
use tracing::debug;

use spacelab_core::domain::{Bar, Space, TradeAction};
use spacelab_core::engine::{OrderRequest, SpaceStrategy, StrategyContext};
use spacelab_core::pip::pip_size;

const ORDER_PLACED_KEY: &str = "breakout_order_placed";

/// Boundary-breakout entry strategy.
#[derive(Debug, Clone)]
pub struct SpaceBreakoutStrategy {
    pub breakout_buffer_pips: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
}

impl SpaceBreakoutStrategy {
    pub fn new(breakout_buffer_pips: f64, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        assert!(breakout_buffer_pips >= 0.0, "breakout_buffer_pips must be >= 0");
        assert!(stop_loss_pips > 0.0, "stop_loss_pips must be positive");
        assert!(take_profit_pips > 0.0, "take_profit_pips must be positive");
        Self {
            breakout_buffer_pips,
            stop_loss_pips,
            take_profit_pips,
        }
    }

    pub fn default_params() -> Self {
        Self::new(1.0, 20.0, 40.0)
    }
}

impl SpaceStrategy for SpaceBreakoutStrategy {
    fn name(&self) -> &str {
        "space_breakout"
    }

    fn on_active_space(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        bar: &Bar,
        spaces: &mut [Space],
        idx: usize,
    ) {
        let space = &mut spaces[idx];
        if space.scratch.get(ORDER_PLACED_KEY).is_some() {
            return;
        }
        let Some(pip) = pip_size(&space.symbol) else {
            debug!(symbol = %space.symbol, "no pip size; breakout buffers inapplicable");
            return;
        };
        let buffer = self.breakout_buffer_pips * pip;

        let action = if bar.close > space.high + buffer {
            TradeAction::Buy
        } else if bar.close < space.low - buffer {
            TradeAction::Sell
        } else {
            return;
        };

        let (stop_loss, take_profit) = match action {
            TradeAction::Buy => (
                bar.close - self.stop_loss_pips * pip,
                bar.close + self.take_profit_pips * pip,
            ),
            TradeAction::Sell => (
                bar.close + self.stop_loss_pips * pip,
                bar.close - self.take_profit_pips * pip,
            ),
        };

        ctx.orders.place_order(OrderRequest {
            symbol: space.symbol.clone(),
            action,
            price: bar.close,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            space_id: space.id.clone(),
            comment: format!("space breakout {:?}", action),
        });
        space.scratch.insert(ORDER_PLACED_KEY.into(), json!(true));

        let metadata = HashMap::from([
            ("space_high".to_string(), json!(space.high)),
            ("space_low".to_string(), json!(space.low)),
        ]);
        let symbol = space.symbol.clone();
        ctx.submit_signal("space_breakout", &symbol, action, 1.0, metadata);
    }
}
