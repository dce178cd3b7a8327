//! SpaceLab Strategies — concrete decision hooks over the space engine.
//!
//! Each strategy implements `SpaceStrategy` and consumes the same per-bar
//! contract: the active-space slice for the symbol, the order sink, the
//! signal aggregator and the key-time detector. Entry pattern recognition is
//! deliberately minimal; the point of these implementations is how they plug
//! into the space lifecycle, not candlestick science.

pub mod breakout;
pub mod exhaustion;
pub mod resonance_sweep;
pub mod retrace;
pub mod session;
pub mod suite;
pub mod turning_point;

pub use breakout::SpaceBreakoutStrategy;
pub use exhaustion::ExhaustionStrategy;
pub use resonance_sweep::SpaceTimeResonanceStrategy;
pub use retrace::RetraceEntryStrategy;
pub use session::{load_inputs, SessionInputs};
pub use suite::StrategySuite;
pub use turning_point::KeyTimeTurningPointStrategy;
