//! Playmart
//!
//! An ETL pipeline that loads JSON song-metadata and user-activity files
//! into a SQLite star schema for song-play analytics.

pub mod ingest;
pub mod mart_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use ingest::{run_pipeline, PipelineStats};
pub use mart_store::{MartStore, SqliteMartStore, StoreError};
