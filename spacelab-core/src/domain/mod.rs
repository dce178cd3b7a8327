//! Domain types: bars, series, events, spaces, signals, IDs.

pub mod bar;
pub mod event;
pub mod ids;
pub mod series;
pub mod signal;
pub mod space;

pub use bar::Bar;
pub use event::{parse_indicator_value, EconomicEvent};
pub use ids::SpaceId;
pub use series::BarSeries;
pub use signal::{StrategySignal, TradeAction};
pub use space::{
    BrcPhase, BrcState, CloseRegion, Direction, InvalidationReason, OscillationState, Space,
    SpaceStatus, StrongBreakoutState,
};
