//! Pip size resolution — maps a symbol to its minimum price increment.
//!
//! Trivial but load-bearing: every boundary buffer and height validation is
//! denominated in pips. The fallback of 0.0001 for unrecognized FX-like
//! symbols is a known-imprecise guess carried over deliberately — it warns
//! loudly instead of failing, and must not be silently "fixed" without a
//! real instrument database behind it.

use tracing::{info, warn};

/// Symbols with a known pip size. Majors use the 4th decimal; JPY crosses
/// and metals the 2nd.
const KNOWN_PIP_SIZES: &[(&str, f64)] = &[
    ("EURUSD", 0.0001),
    ("GBPUSD", 0.0001),
    ("AUDUSD", 0.0001),
    ("NZDUSD", 0.0001),
    ("USDCAD", 0.0001),
    ("USDCHF", 0.0001),
    ("USDJPY", 0.01),
    ("EURJPY", 0.01),
    ("GBPJPY", 0.01),
    ("AUDJPY", 0.01),
    ("CHFJPY", 0.01),
    ("CADJPY", 0.01),
    ("NZDJPY", 0.01),
    ("XAUUSD", 0.01),
    ("XAGUSD", 0.01),
];

/// Name fragments marking indices, stocks and commodities, where an FX-style
/// pip is not applicable and pip-denominated buffers must be skipped.
const NON_FX_PATTERNS: &[&str] = &["SPX", "D30", "TSLA", "XBR", "XTI", "NASDAQ", "STOXX", ".OQ", ".N"];

/// Resolve the pip size for a symbol.
///
/// Returns `None` for index/stock/commodity symbols; callers must treat
/// pip-denominated buffers as inapplicable for those. Unrecognized FX-like
/// symbols fall back to 0.0001 with a loud warning.
pub fn pip_size(symbol: &str) -> Option<f64> {
    let upper = symbol.to_ascii_uppercase();

    if let Some((_, size)) = KNOWN_PIP_SIZES.iter().find(|(s, _)| *s == upper) {
        return Some(*size);
    }

    // Broker-suffixed JPY crosses ("EURJPY.BROKER") follow the JPY convention.
    if upper.contains("JPY") {
        info!(symbol, "assuming JPY pair convention (0.01 pip size); verify for this broker");
        return Some(0.01);
    }

    if NON_FX_PATTERNS.iter().any(|p| upper.contains(p)) {
        warn!(
            symbol,
            "symbol looks like an index/stock/commodity; FX-style pip size is not applicable, \
             pip-denominated buffers must be handled by instrument-specific configuration"
        );
        return None;
    }

    warn!(
        symbol,
        fallback = 0.0001,
        "pip size not predefined; falling back to 0.0001 — VERIFY this is correct, an incorrect \
         pip size corrupts every buffer and height calculation for this symbol"
    );
    Some(0.0001)
}
