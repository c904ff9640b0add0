pub mod config;
pub mod error;
pub mod db;
pub mod health;
pub mod store;

pub use config::Config;
pub use error::{LiftlogError, Result};
pub use health::{
    merge_into_store, parse_export, parse_export_file, validate_export_name, HealthImportResult,
    ImportOptions, ImportProgress, MergeReport,
};
pub use store::{HealthStore, MemoryStore, SqliteStore};
