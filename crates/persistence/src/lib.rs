#![deny(warnings)]

//! Persistence layer: JSON snapshots stored in SQLite save slots.

pub mod snapshot;
pub mod store;

pub use snapshot::{
    BuildingRecord, CadenceRecord, CityRecord, RealmRecord, Snapshot, SNAPSHOT_VERSION,
};
pub use store::{create_save, init_db, latest_save, load_latest_snapshot, store_snapshot};

use thiserror::Error;

/// Errors raised while saving or loading.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}
