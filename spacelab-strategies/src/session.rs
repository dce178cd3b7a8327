//! Session assembly — load the config and CSV feeds, hand back everything a
//! backtest loop needs to drive the engine.
//!
//! The loaders themselves live in `spacelab-core::data`; this module only
//! composes them with context so a broken path or file names itself in the
//! error chain.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use spacelab_core::config::SpaceLabConfig;
use spacelab_core::data::{load_bars_csv, load_calendar_csv};
use spacelab_core::domain::{BarSeries, EconomicEvent};

/// Everything an engine run consumes.
#[derive(Debug)]
pub struct SessionInputs {
    pub config: SpaceLabConfig,
    pub events: Vec<EconomicEvent>,
    pub series_by_symbol: HashMap<String, BarSeries>,
}

/// Load a complete session: TOML config, calendar CSV, one bar CSV per symbol.
pub fn load_inputs(
    config_path: impl AsRef<Path>,
    calendar_path: impl AsRef<Path>,
    bar_files: &[(String, std::path::PathBuf)],
) -> Result<SessionInputs> {
    let config = SpaceLabConfig::load(config_path.as_ref())
        .with_context(|| format!("loading config {}", config_path.as_ref().display()))?;
    let events = load_calendar_csv(calendar_path.as_ref())
        .with_context(|| format!("loading calendar {}", calendar_path.as_ref().display()))?;

    let mut series_by_symbol = HashMap::new();
    for (symbol, path) in bar_files {
        let series = load_bars_csv(path, symbol)
            .with_context(|| format!("loading bars for {symbol} from {}", path.display()))?;
        series_by_symbol.insert(symbol.clone(), series);
    }

    Ok(SessionInputs {
        config,
        events,
        series_by_symbol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_a_complete_session() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(
            &dir,
            "spacelab.toml",
            "[space]\nspace_duration_minutes = 120\n",
        );
        let calendar_path = write_file(
            &dir,
            "calendar.csv",
            "id,datetime,country_code,title,actual,forecast,previous\n\
             nfp-1,2024-03-08 13:30:00,US,Non-Farm Payrolls,275K,200K,229K\n",
        );
        let bars_path = write_file(
            &dir,
            "eurusd_m30.csv",
            "time,open,high,low,close,volume\n\
             2024-03-08 13:30:00,1.1004,1.1012,1.1000,1.1008,5000\n",
        );

        let inputs = load_inputs(
            &config_path,
            &calendar_path,
            &[("EURUSD".to_string(), bars_path)],
        )
        .unwrap();
        assert_eq!(inputs.config.space.space_duration_minutes, 120);
        assert_eq!(inputs.events.len(), 1);
        assert_eq!(inputs.series_by_symbol["EURUSD"].len(), 1);
    }

    #[test]
    fn missing_config_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let calendar_path = write_file(
            &dir,
            "calendar.csv",
            "id,datetime,country_code,title,actual,forecast,previous\n",
        );
        let err = load_inputs(dir.path().join("absent.toml"), &calendar_path, &[]).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
