//! SpaceLab Core — event-driven price-space lifecycle engine.
//!
//! This crate contains the heart of the research stack:
//! - Domain types (bars, series, economic events, spaces, signals)
//! - Space construction from an event's initial market reaction
//! - The per-bar invalidation state machine (duration, strong breakout,
//!   oscillation, breakout-retrace-confirmation)
//! - Rule-driven event-to-symbol mapping
//! - Key-time detection (event-relative offsets + fixed daily windows)
//! - Cross-strategy signal aggregation and resonance
//! - The orchestrating engine and the strategy decision-hook trait

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod keytime;
pub mod mapping;
pub mod pip;
pub mod resonance;
pub mod space;
