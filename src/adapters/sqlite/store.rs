//! Store bootstrap.
//!
//! Opening the store is one operation: connect the pool (WAL, foreign
//! keys, timeouts from config) and bring the schema up to date. Each
//! embedded schema step is fingerprinted; when a database was built
//! from SQL that no longer matches the embedded text, the open aborts
//! with a drift error instead of running divergent DDL against live
//! draw data.

use siphasher::sip::SipHasher13;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::hash::Hasher;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to create database directory for {path}: {source}")]
    DirectoryFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("schema step {version} ({name}) failed: {source}")]
    SchemaStepFailed {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error(
        "schema step {version} drifted: database applied checksum {applied}, embedded SQL is {embedded}"
    )]
    SchemaDrift { version: i64, applied: String, embedded: String },
    #[error("schema history unreadable: {0}")]
    HistoryUnreadable(#[source] sqlx::Error),
}

/// Connection knobs, carried over from `DatabaseConfig` by the caller.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub path: String,
    pub max_connections: u32,
    /// Shared by SQLite's busy handler and the pool's acquire wait.
    pub busy_timeout: Duration,
}

/// One ordered schema step, embedded at compile time.
struct SchemaStep {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "initial schema",
    sql: include_str!("../../../migrations/001_initial_schema.sql"),
}];

/// Fingerprint of a schema step's SQL text, stored alongside the
/// applied version so later binaries can detect divergence.
fn fingerprint(sql: &str) -> String {
    let mut hasher = SipHasher13::new_with_keys(0x73636865_6d612121, 0x666f7274_756e6121);
    hasher.write(sql.as_bytes());
    format!("{:016x}", hasher.finish())
}

/// The authoritative relational store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) a file-backed store and apply any
    /// unapplied schema steps.
    pub async fn open(settings: &StoreSettings) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(&settings.path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::DirectoryFailed {
                    path: settings.path.clone(),
                    source,
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&settings.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(settings.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(settings.busy_timeout)
            .connect_with(options)
            .await
            .map_err(|source| StoreError::OpenFailed { path: settings.path.clone(), source })?;

        let applied = apply_schema(&pool).await?;
        if applied > 0 {
            info!(path = %settings.path, applied, "schema steps applied");
        }
        Ok(Self { pool })
    }

    /// Shared in-memory store for tests. A single connection keeps
    /// every transaction on the same database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options: SqliteConnectOptions = "sqlite::memory:"
            .parse()
            .map_err(|source| StoreError::OpenFailed { path: ":memory:".to_string(), source })?;
        let options = options.shared_cache(true).foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| StoreError::OpenFailed { path: ":memory:".to_string(), source })?;

        apply_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}

/// Bring the schema up to the embedded steps. Already-applied steps
/// are verified against their recorded fingerprint.
async fn apply_schema(pool: &SqlitePool) -> Result<u32, StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_history (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            checksum TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(StoreError::HistoryUnreadable)?;

    let history: Vec<(i64, String)> = sqlx::query_as("SELECT version, checksum FROM schema_history")
        .fetch_all(pool)
        .await
        .map_err(StoreError::HistoryUnreadable)?;

    let mut applied = 0;
    for step in SCHEMA {
        let embedded = fingerprint(step.sql);
        match history.iter().find(|(version, _)| *version == step.version) {
            Some((_, recorded)) if *recorded == embedded => {}
            Some((_, recorded)) => {
                return Err(StoreError::SchemaDrift {
                    version: step.version,
                    applied: recorded.clone(),
                    embedded,
                });
            }
            None => {
                sqlx::raw_sql(step.sql).execute(pool).await.map_err(|source| {
                    StoreError::SchemaStepFailed { version: step.version, name: step.name, source }
                })?;
                sqlx::query(
                    "INSERT INTO schema_history (version, name, checksum) VALUES (?, ?, ?)",
                )
                .bind(step.version)
                .bind(step.name)
                .bind(&embedded)
                .execute(pool)
                .await
                .map_err(|source| StoreError::SchemaStepFailed {
                    version: step.version,
                    name: step.name,
                    source,
                })?;
                applied += 1;
            }
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_has_the_schema() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'campaigns'",
        )
        .fetch_one(&store.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn reopening_a_store_applies_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            path: dir.path().join("fortuna.db").to_string_lossy().into_owned(),
            max_connections: 2,
            busy_timeout: Duration::from_secs(5),
        };

        let first = SqliteStore::open(&settings).await.unwrap();
        drop(first);
        let second = SqliteStore::open(&settings).await.unwrap();

        let (steps,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_history")
            .fetch_one(&second.pool())
            .await
            .unwrap();
        assert_eq!(steps, SCHEMA.len() as i64);
    }

    #[tokio::test]
    async fn drifted_schema_step_aborts_the_open() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            path: dir.path().join("fortuna.db").to_string_lossy().into_owned(),
            max_connections: 2,
            busy_timeout: Duration::from_secs(5),
        };

        let store = SqliteStore::open(&settings).await.unwrap();
        sqlx::query("UPDATE schema_history SET checksum = 'deadbeefdeadbeef' WHERE version = 1")
            .execute(&store.pool())
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteStore::open(&settings).await;
        assert!(matches!(reopened, Err(StoreError::SchemaDrift { version: 1, .. })));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = fingerprint("CREATE TABLE t (id INTEGER)");
        let b = fingerprint("CREATE TABLE t (id INTEGER)");
        let c = fingerprint("CREATE TABLE t (id TEXT)");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
