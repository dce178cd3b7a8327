//! Retrace entry — join a breakout after its pullback to the boundary.
//!
//! Three-step entry per space, tracked entirely in scratch fields so the
//! engine can prune and recreate strategies without losing per-space state:
//! a close beyond a boundary arms the setup; a pullback into the boundary
//! zone places the order with the breakout; the `placed` marker prevents a
//! duplicate entry for the life of the space.

use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

use spacelab_core::domain::{Bar, Space, TradeAction};
use spacelab_core::engine::{OrderRequest, SpaceStrategy, StrategyContext};
use spacelab_core::pip::pip_size;

const PHASE_KEY: &str = "retrace_phase";
const DIRECTION_KEY: &str = "retrace_direction";
const PHASE_ARMED: &str = "armed";
const PHASE_PLACED: &str = "placed";

/// Breakout-pullback entry strategy.
#[derive(Debug, Clone)]
pub struct RetraceEntryStrategy {
    /// Pullback zone around the broken boundary, as a ratio of space height.
    pub retrace_zone_ratio: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
}

impl RetraceEntryStrategy {
    pub fn new(retrace_zone_ratio: f64, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        assert!(
            (0.0..1.0).contains(&retrace_zone_ratio),
            "retrace_zone_ratio must be in [0, 1)"
        );
        assert!(stop_loss_pips > 0.0, "stop_loss_pips must be positive");
        assert!(take_profit_pips > 0.0, "take_profit_pips must be positive");
        Self {
            retrace_zone_ratio,
            stop_loss_pips,
            take_profit_pips,
        }
    }

    pub fn default_params() -> Self {
        Self::new(0.25, 20.0, 45.0)
    }

    fn phase(space: &Space) -> Option<&str> {
        space.scratch.get(PHASE_KEY).and_then(|v| v.as_str())
    }
}

impl SpaceStrategy for RetraceEntryStrategy {
    fn name(&self) -> &str {
        "retrace_entry"
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
            debug!(symbol = %space.symbol, "no pip size; retrace stops inapplicable");
            return;
        };
        let zone = self.retrace_zone_ratio * space.height();

        match Self::phase(space) {
            None => {
                // Arm on the first close beyond a boundary.
                let direction = if bar.close > space.high {
                    Some(TradeAction::Buy)
                } else if bar.close < space.low {
                    Some(TradeAction::Sell)
                } else {
                    None
                };
                if let Some(direction) = direction {
                    space.scratch.insert(PHASE_KEY.into(), json!(PHASE_ARMED));
                    space.scratch.insert(DIRECTION_KEY.into(), json!(direction));
                    debug!(
                        space_id = %space.id,
                        symbol = %space.symbol,
                        ?direction,
                        "retrace entry armed"
                    );
                }
            }
            Some(PHASE_ARMED) => {
                let direction = match space
                    .scratch
                    .get(DIRECTION_KEY)
                    .and_then(|v| serde_json::from_value::<TradeAction>(v.clone()).ok())
                {
                    Some(direction) => direction,
                    None => {
                        space.scratch.remove(PHASE_KEY);
                        return;
                    }
                };
                let pulled_back = match direction {
                    TradeAction::Buy => bar.low <= space.high + zone && bar.close > space.low,
                    TradeAction::Sell => bar.high >= space.low - zone && bar.close < space.high,
                };
                if !pulled_back {
                    return;
                }
                let (stop_loss, take_profit) = match direction {
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
                    action: direction,
                    price: bar.close,
                    stop_loss: Some(stop_loss),
                    take_profit: Some(take_profit),
                    space_id: space.id.clone(),
                    comment: format!("retrace entry {:?}", direction),
                });
                space.scratch.insert(PHASE_KEY.into(), json!(PHASE_PLACED));

                let symbol = space.symbol.clone();
                ctx.submit_signal("retrace_entry", &symbol, direction, 0.9, HashMap::new());
            }
            Some(_) => {
                // placed (or unknown) — nothing further for this space
            }
        }
    }
}
