//! SQLite save slots holding JSON snapshots.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use crate::snapshot::Snapshot;
use crate::PersistenceError;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS saves (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        note TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE IF NOT EXISTS snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        save_id INTEGER NOT NULL REFERENCES saves(id),
        sim_date TEXT NOT NULL,
        payload TEXT NOT NULL
    )",
];

/// Open (creating if missing) the database at `url` and ensure the schema.
pub async fn init_db(url: &str) -> Result<SqlitePool, PersistenceError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // A single long-lived connection keeps `sqlite::memory:` databases alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    info!(%url, "database ready");
    Ok(pool)
}

/// Create a save slot and return its id.
pub async fn create_save(
    pool: &SqlitePool,
    name: &str,
    note: Option<&str>,
) -> Result<i64, PersistenceError> {
    let id = sqlx::query("INSERT INTO saves (name, note) VALUES (?, ?)")
        .bind(name)
        .bind(note)
        .execute(pool)
        .await?
        .last_insert_rowid();
    debug!(save = id, %name, "save created");
    Ok(id)
}

/// Append a snapshot to a save slot and return the snapshot row id.
pub async fn store_snapshot(
    pool: &SqlitePool,
    save_id: i64,
    snapshot: &Snapshot,
) -> Result<i64, PersistenceError> {
    let payload = snapshot.to_json()?;
    let id = sqlx::query("INSERT INTO snapshots (save_id, sim_date, payload) VALUES (?, ?, ?)")
        .bind(save_id)
        .bind(snapshot.date.to_string())
        .bind(payload)
        .execute(pool)
        .await?
        .last_insert_rowid();
    info!(save = save_id, snapshot = id, date = %snapshot.date, "snapshot stored");
    Ok(id)
}

/// Most recently stored snapshot of a save slot.
pub async fn load_latest_snapshot(
    pool: &SqlitePool,
    save_id: i64,
) -> Result<Option<Snapshot>, PersistenceError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT payload FROM snapshots WHERE save_id = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(save_id)
    .fetch_optional(pool)
    .await?;
    row.map(|(payload,)| Snapshot::from_json(&payload)).transpose()
}

/// Newest save slot, if any.
pub async fn latest_save(pool: &SqlitePool) -> Result<Option<i64>, PersistenceError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM saves ORDER BY id DESC LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(id,)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sim_core::SimConfig;

    #[tokio::test]
    async fn latest_snapshot_wins() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let save = create_save(&pool, "campaign", Some("test")).await.unwrap();
        assert!(load_latest_snapshot(&pool, save).await.unwrap().is_none());

        let first = Snapshot::new(NaiveDate::from_ymd_opt(1200, 1, 1).unwrap(), SimConfig::default());
        let mut second = first.clone();
        second.date = NaiveDate::from_ymd_opt(1201, 1, 1).unwrap();
        store_snapshot(&pool, save, &first).await.unwrap();
        store_snapshot(&pool, save, &second).await.unwrap();

        let loaded = load_latest_snapshot(&pool, save).await.unwrap().unwrap();
        assert_eq!(loaded, second);
        let other = create_save(&pool, "other", None).await.unwrap();
        assert!(load_latest_snapshot(&pool, other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn schema_init_is_repeatable() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        assert_eq!(create_save(&pool, "a", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn latest_save_tracks_newest_slot() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        assert_eq!(latest_save(&pool).await.unwrap(), None);
        create_save(&pool, "a", None).await.unwrap();
        let b = create_save(&pool, "b", None).await.unwrap();
        assert_eq!(latest_save(&pool).await.unwrap(), Some(b));
    }
}
