//! Space invalidation — the per-bar state machine that retires a space.
//!
//! Four independent conditions are evaluated in fixed priority order, first
//! match wins, and later checks are skipped for that bar:
//!
//! 1. duration expiry (hard time limit)
//! 2. strong breakout (close beyond a boundary by more than 2x the space
//!    height, confirmed after N bars without re-entry)
//! 3. oscillation (M close-transitions across the boundaries)
//! 4. breakout-retrace-confirmation (breakout, pullback to the level,
//!    resumption — a confirmed trend change)
//!
//! Every check mutates the space's working state in place; the terminal
//! status is recorded through `Space::invalidate`, which keeps the first
//! reason and ignores the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Bar, BrcPhase, CloseRegion, Direction, InvalidationReason, Space};

/// Invalidation thresholds, lifted from configuration once per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InvalidationConfig {
    /// Bars a strong breakout must hold outside the space before confirming.
    #[serde(default = "default_n_bars")]
    pub strong_breakout_n_bars: u32,
    /// Boundary crossings that exhaust the space.
    #[serde(default = "default_m_times")]
    pub oscillation_m_times: u32,
    /// Buffer around a boundary for the retrace-confirmation machine,
    /// as a ratio of space height.
    #[serde(default = "default_buffer_ratio")]
    pub retrace_confirmation_buffer_ratio: f64,
}

fn default_n_bars() -> u32 {
    3
}
fn default_m_times() -> u32 {
    5
}
fn default_buffer_ratio() -> f64 {
    0.25
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            strong_breakout_n_bars: default_n_bars(),
            oscillation_m_times: default_m_times(),
            retrace_confirmation_buffer_ratio: default_buffer_ratio(),
        }
    }
}

/// Run one bar through all invalidation checks for one space.
///
/// Returns true when the space is (or already was) invalidated. The caller
/// prunes non-active spaces immediately after; an inactive space passed back
/// in is a no-op.
pub fn check(
    space: &mut Space,
    bar: &Bar,
    now: DateTime<Utc>,
    config: &InvalidationConfig,
) -> bool {
    if !space.is_active() {
        return true;
    }

    if now > space.valid_until {
        info!(
            space_id = %space.id,
            symbol = %space.symbol,
            valid_until = %space.valid_until,
            "space invalidated: duration expired"
        );
        space.invalidate(InvalidationReason::DurationExpired);
        return true;
    }

    if check_strong_breakout(space, bar, config) {
        return true;
    }

    if check_oscillation(space, bar, config) {
        return true;
    }

    check_breakout_retrace_confirmation(space, bar, config)
}

fn check_strong_breakout(space: &mut Space, bar: &Bar, config: &InvalidationConfig) -> bool {
    let n_bars = config.strong_breakout_n_bars.max(1);

    if let Some(direction) = space.strong_breakout.pending {
        space.strong_breakout.bars_outside += 1;

        let returned_to_space = match direction {
            Direction::Up => bar.low < space.high,
            Direction::Down => bar.high > space.low,
        };
        if returned_to_space {
            debug!(
                space_id = %space.id,
                symbol = %space.symbol,
                ?direction,
                "strong breakout aborted: price returned to space"
            );
            space.strong_breakout.reset();
            return false;
        }

        if space.strong_breakout.bars_outside >= n_bars {
            let reason = match direction {
                Direction::Up => InvalidationReason::StrongBreakoutUpConfirmed,
                Direction::Down => InvalidationReason::StrongBreakoutDownConfirmed,
            };
            info!(
                space_id = %space.id,
                symbol = %space.symbol,
                ?direction,
                bars_outside = space.strong_breakout.bars_outside,
                "space invalidated: strong breakout confirmed"
            );
            space.invalidate(reason);
            return true;
        }
        return false;
    }

    let height = space.height();
    let detected = if bar.close > space.high && (bar.close - space.high) > 2.0 * height {
        Some(Direction::Up)
    } else if bar.close < space.low && (space.low - bar.close) > 2.0 * height {
        Some(Direction::Down)
    } else {
        None
    };

    if let Some(direction) = detected {
        space.strong_breakout.pending = Some(direction);
        space.strong_breakout.bars_outside = 1;
        if n_bars == 1 {
            let reason = match direction {
                Direction::Up => InvalidationReason::StrongBreakoutUpConfirmed,
                Direction::Down => InvalidationReason::StrongBreakoutDownConfirmed,
            };
            info!(
                space_id = %space.id,
                symbol = %space.symbol,
                ?direction,
                "space invalidated: strong breakout confirmed immediately (N=1)"
            );
            space.invalidate(reason);
            return true;
        }
        info!(
            space_id = %space.id,
            symbol = %space.symbol,
            ?direction,
            close = bar.close,
            "strong breakout pending confirmation"
        );
    }
    false
}

fn check_oscillation(space: &mut Space, bar: &Bar, config: &InvalidationConfig) -> bool {
    let region = space.region_of(bar.close);

    // One count per boundary crossed by consecutive closes; a close jumping
    // the whole space crosses both. The first close only seeds the region.
    let crossed = match (space.oscillation.last_region, region) {
        (None, _) => 0,
        (Some(prev), cur) if prev == cur => 0,
        (Some(CloseRegion::Above), CloseRegion::Below)
        | (Some(CloseRegion::Below), CloseRegion::Above) => 2,
        _ => 1,
    };
    space.oscillation.last_region = Some(region);
    space.oscillation.crossings += crossed;

    if space.oscillation.crossings >= config.oscillation_m_times {
        info!(
            space_id = %space.id,
            symbol = %space.symbol,
            crossings = space.oscillation.crossings,
            limit = config.oscillation_m_times,
            "space invalidated: oscillation"
        );
        space.invalidate(InvalidationReason::Oscillation);
        return true;
    }
    false
}

fn check_breakout_retrace_confirmation(
    space: &mut Space,
    bar: &Bar,
    config: &InvalidationConfig,
) -> bool {
    let buffer = config.retrace_confirmation_buffer_ratio * space.height();

    match space.brc.phase {
        BrcPhase::Idle => {
            let detected = if bar.close > space.high + buffer {
                Some(Direction::Up)
            } else if bar.close < space.low - buffer {
                Some(Direction::Down)
            } else {
                None
            };
            if let Some(direction) = detected {
                space.brc.phase = BrcPhase::WaitingForRetrace;
                space.brc.direction = Some(direction);
                space.brc.initial_breakout_price = Some(bar.close);
                info!(
                    space_id = %space.id,
                    symbol = %space.symbol,
                    ?direction,
                    breakout_close = bar.close,
                    "BRC: breakout detected, waiting for retrace"
                );
            }
            false
        }

        BrcPhase::WaitingForRetrace => {
            let Some(direction) = space.brc.direction else {
                warn!(space_id = %space.id, "BRC: waiting for retrace without a direction; resetting");
                space.brc.reset();
                return false;
            };
            // A hard reversal through the opposite boundary outranks a
            // same-bar touch of the buffer zone.
            match direction {
                Direction::Up => {
                    if bar.close < space.low {
                        debug!(space_id = %space.id, close = bar.close, "BRC: hard reversal, reset");
                        space.brc.reset();
                    } else if bar.low <= space.high + buffer {
                        space.brc.phase = BrcPhase::WaitingForConfirmation;
                        space.brc.retrace_price = Some(bar.low);
                        info!(
                            space_id = %space.id,
                            retrace_price = bar.low,
                            "BRC: retrace achieved, waiting for confirmation"
                        );
                    }
                }
                Direction::Down => {
                    if bar.close > space.high {
                        debug!(space_id = %space.id, close = bar.close, "BRC: hard reversal, reset");
                        space.brc.reset();
                    } else if bar.high >= space.low - buffer {
                        space.brc.phase = BrcPhase::WaitingForConfirmation;
                        space.brc.retrace_price = Some(bar.high);
                        info!(
                            space_id = %space.id,
                            retrace_price = bar.high,
                            "BRC: retrace achieved, waiting for confirmation"
                        );
                    }
                }
            }
            false
        }

        BrcPhase::WaitingForConfirmation => {
            let (Some(direction), Some(initial)) =
                (space.brc.direction, space.brc.initial_breakout_price)
            else {
                warn!(space_id = %space.id, "BRC: confirmation phase with incomplete state; resetting");
                space.brc.reset();
                return false;
            };
            match direction {
                Direction::Up => {
                    if bar.close > initial {
                        info!(
                            space_id = %space.id,
                            symbol = %space.symbol,
                            confirm_close = bar.close,
                            initial_breakout = initial,
                            "space invalidated: breakout-retrace-confirmation up"
                        );
                        space.invalidate(InvalidationReason::BreakoutRetraceConfirmUp);
                        return true;
                    }
                    if bar.close < space.low {
                        debug!(space_id = %space.id, close = bar.close, "BRC: hard reversal, reset");
                        space.brc.reset();
                    }
                }
                Direction::Down => {
                    if bar.close < initial {
                        info!(
                            space_id = %space.id,
                            symbol = %space.symbol,
                            confirm_close = bar.close,
                            initial_breakout = initial,
                            "space invalidated: breakout-retrace-confirmation down"
                        );
                        space.invalidate(InvalidationReason::BreakoutRetraceConfirmDown);
                        return true;
                    }
                    if bar.close > space.high {
                        debug!(space_id = %space.id, close = bar.close, "BRC: hard reversal, reset");
                        space.brc.reset();
                    }
                }
            }
            false
        }
    }
}
