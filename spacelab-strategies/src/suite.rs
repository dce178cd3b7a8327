//! StrategySuite — run several strategies against the same space stream.
//!
//! The engine drives one `SpaceStrategy`; the suite fans each hook out to
//! every member in registration order, so concurrent strategies share one
//! space registry and one signal aggregator.

use spacelab_core::domain::{Bar, Space};
use spacelab_core::engine::{SpaceStrategy, StrategyContext};
use spacelab_core::resonance::ResonantSignal;

/// Fan-out composite over multiple strategies.
#[derive(Default)]
pub struct StrategySuite {
    members: Vec<Box<dyn SpaceStrategy>>,
}

impl StrategySuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: Box<dyn SpaceStrategy>) -> Self {
        self.members.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl SpaceStrategy for StrategySuite {
    fn name(&self) -> &str {
        "strategy_suite"
    }

    fn on_active_space(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        bar: &Bar,
        spaces: &mut [Space],
        idx: usize,
    ) {
        for member in &mut self.members {
            member.on_active_space(ctx, bar, spaces, idx);
        }
    }

    fn on_resonance(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        symbol: &str,
        signal: &ResonantSignal,
        spaces: &mut [Space],
    ) {
        for member in &mut self.members {
            member.on_resonance(ctx, symbol, signal, spaces);
        }
    }
}
