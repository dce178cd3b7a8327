use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic space ID (hash of originating event + symbol + creation time).
///
/// Content-addressable so that re-running the same event stream produces the
/// same IDs, which makes key-time trigger bookkeeping and logs comparable
/// across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(pub String);

impl SpaceId {
    /// Generate the deterministic ID.
    /// Uses BLAKE3 for stable, collision-resistant hashing across builds/platforms.
    pub fn derive(event_id: &str, symbol: &str, creation_time: DateTime<Utc>) -> Self {
        use serde_json::json;

        // Canonical serialization (sorted keys)
        let canonical = json!({
            "creation_time": creation_time.to_rfc3339(),
            "event_id": event_id,
            "symbol": symbol,
        });

        let hash = blake3::hash(canonical.to_string().as_bytes());
        // 16 hex chars are plenty for log-line identifiers
        Self(hash.to_hex().as_str()[..16].to_string())
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
