//! Data ingest for external feeds.

pub mod ingest;

pub use ingest::{load_bars_csv, load_calendar_csv, IngestError};
