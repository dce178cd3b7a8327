//! Configuration — TOML-sourced, serde-defaulted, validated once at load.
//!
//! Every field has a default so a partial file (or an empty one) yields a
//! runnable configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::keytime::FixedKeyTimeRule;
use crate::mapping::EventMappingRule;
use crate::resonance::ResonanceConfig;
use crate::space::invalidation::InvalidationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Space construction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceConfig {
    #[serde(default = "default_duration_minutes")]
    pub space_duration_minutes: i64,
    #[serde(default = "default_min_height_pips")]
    pub min_space_height_pips: f64,
}

fn default_duration_minutes() -> i64 {
    60
}
fn default_min_height_pips() -> f64 {
    5.0
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            space_duration_minutes: default_duration_minutes(),
            min_space_height_pips: default_min_height_pips(),
        }
    }
}

/// Key-time detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyTimeConfig {
    #[serde(default = "default_hours_after_event")]
    pub hours_after_event: Vec<u32>,
    #[serde(default)]
    pub fixed_windows: Vec<FixedKeyTimeRule>,
}

fn default_hours_after_event() -> Vec<u32> {
    vec![1, 3, 5]
}

impl Default for KeyTimeConfig {
    fn default() -> Self {
        Self {
            hours_after_event: default_hours_after_event(),
            fixed_windows: Vec::new(),
        }
    }
}

/// Resonance layer switch plus aggregator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub config: ResonanceConfig,
}

fn default_true() -> bool {
    true
}

impl Default for ResonanceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config: ResonanceConfig::default(),
        }
    }
}

/// Top-level configuration for the space lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceLabConfig {
    #[serde(default = "default_primary_timeframe")]
    pub primary_timeframe: String,
    #[serde(default)]
    pub space: SpaceConfig,
    #[serde(default)]
    pub invalidation: InvalidationConfig,
    #[serde(default)]
    pub key_time: KeyTimeConfig,
    #[serde(default)]
    pub resonance: ResonanceSettings,
    #[serde(default)]
    pub event_mappings: Vec<EventMappingRule>,
}

fn default_primary_timeframe() -> String {
    "M30".to_string()
}

impl Default for SpaceLabConfig {
    fn default() -> Self {
        Self {
            primary_timeframe: default_primary_timeframe(),
            space: SpaceConfig::default(),
            invalidation: InvalidationConfig::default(),
            key_time: KeyTimeConfig::default(),
            resonance: ResonanceSettings::default(),
            event_mappings: Vec::new(),
        }
    }
}

impl SpaceLabConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.space.space_duration_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "space_duration_minutes must be positive".into(),
            ));
        }
        if self.space.min_space_height_pips <= 0.0 {
            return Err(ConfigError::Invalid(
                "min_space_height_pips must be positive".into(),
            ));
        }
        if self.invalidation.strong_breakout_n_bars == 0 {
            return Err(ConfigError::Invalid(
                "strong_breakout_n_bars must be at least 1".into(),
            ));
        }
        if self.invalidation.oscillation_m_times == 0 {
            return Err(ConfigError::Invalid(
                "oscillation_m_times must be at least 1".into(),
            ));
        }
        let ratio = self.invalidation.retrace_confirmation_buffer_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(ConfigError::Invalid(format!(
                "retrace_confirmation_buffer_ratio must be in [0, 1), got {ratio}"
            )));
        }
        if self.resonance.config.resonance_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "resonance_threshold must be positive".into(),
            ));
        }
        for rule in &self.event_mappings {
            if rule.country_codes.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "event mapping rule '{}' has no country codes",
                    rule.id
                )));
            }
            if rule.symbols_and_reactions.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "event mapping rule '{}' has no symbol reactions",
                    rule.id
                )));
            }
        }
        Ok(())
    }
}
