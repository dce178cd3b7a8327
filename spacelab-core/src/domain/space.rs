//! Space — a tradable price range derived from an economic event's initial
//! market reaction.
//!
//! The core schema is closed: boundaries, timestamps, status, and the three
//! invalidation sub-states are fixed fields. Strategy-specific scratch data
//! (retrace-entry flags, resonance logs) goes in the `scratch` map, which the
//! engine carries but never interprets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::SpaceId;
use super::signal::TradeAction;

/// Direction of a boundary breakout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// Terminal invalidation reasons. A space acquires exactly one, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    DurationExpired,
    StrongBreakoutUpConfirmed,
    StrongBreakoutDownConfirmed,
    Oscillation,
    BreakoutRetraceConfirmUp,
    BreakoutRetraceConfirmDown,
    MissingCreationTime,
}

/// Lifecycle status. Transitions `Active -> Inactive(reason)` exactly once;
/// no space ever re-activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceStatus {
    Active,
    Inactive(InvalidationReason),
}

/// Working state for the strong-breakout invalidation check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrongBreakoutState {
    /// Direction of the pending breakout, `None` when no breakout is pending.
    pub pending: Option<Direction>,
    /// Bars elapsed outside the space since the breakout bar (inclusive).
    pub bars_outside: u32,
}

impl StrongBreakoutState {
    pub fn reset(&mut self) {
        self.pending = None;
        self.bars_outside = 0;
    }
}

/// Which side of the space a close sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseRegion {
    Below,
    Inside,
    Above,
}

/// Working state for the oscillation invalidation check.
///
/// A "crossing" is one boundary crossed by two consecutive closes: a close
/// moving Inside -> Above counts one, Below -> Above counts two (both
/// boundaries were crossed). The counter never decreases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OscillationState {
    pub crossings: u32,
    /// Region of the previous bar's close; `None` until the first bar seeds it.
    pub last_region: Option<CloseRegion>,
}

/// Phase of the breakout-retrace-confirmation machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrcPhase {
    #[default]
    Idle,
    WaitingForRetrace,
    WaitingForConfirmation,
}

/// Working state for the breakout-retrace-confirmation check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrcState {
    pub phase: BrcPhase,
    pub direction: Option<Direction>,
    /// Close of the bar that broke out (the level confirmation must exceed).
    pub initial_breakout_price: Option<f64>,
    /// Extreme the retrace reached when touching the boundary zone.
    pub retrace_price: Option<f64>,
}

impl BrcState {
    pub fn reset(&mut self) {
        self.phase = BrcPhase::Idle;
        self.direction = None;
        self.initial_breakout_price = None;
        self.retrace_price = None;
    }
}

/// A price space: the central entity of the lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub event_id: String,
    pub event_title: String,
    pub symbol: String,
    /// Direction suggested by the event mapping that created this space.
    pub suggested_direction: Option<TradeAction>,

    pub high: f64,
    pub low: f64,
    pub height_pips: f64,

    /// Bar time of the qualifying initial move (not wall-clock processing
    /// time). Always set by the boundary calculator; `None` only for records
    /// deserialized from external sources, which the engine retires with
    /// `MissingCreationTime`.
    pub creation_time: Option<DateTime<Utc>>,
    pub event_time: DateTime<Utc>,
    /// Computed once at creation, never recomputed.
    pub valid_until: DateTime<Utc>,

    pub status: SpaceStatus,
    pub strong_breakout: StrongBreakoutState,
    pub oscillation: OscillationState,
    pub brc: BrcState,

    /// Strategy-owned extension data; opaque to the engine.
    #[serde(default)]
    pub scratch: HashMap<String, serde_json::Value>,
}

impl Space {
    pub fn height(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_active(&self) -> bool {
        self.status == SpaceStatus::Active
    }

    /// Region of a close price relative to the boundaries. Closes exactly on
    /// a boundary count as Inside.
    pub fn region_of(&self, close: f64) -> CloseRegion {
        if close > self.high {
            CloseRegion::Above
        } else if close < self.low {
            CloseRegion::Below
        } else {
            CloseRegion::Inside
        }
    }

    /// Record the terminal invalidation reason. The first reason wins: a
    /// space that is already inactive is left untouched.
    pub fn invalidate(&mut self, reason: InvalidationReason) {
        if self.status == SpaceStatus::Active {
            self.status = SpaceStatus::Inactive(reason);
        }
    }

    pub fn invalidation_reason(&self) -> Option<InvalidationReason> {
        match self.status {
            SpaceStatus::Active => None,
            SpaceStatus::Inactive(reason) => Some(reason),
        }
    }
}
