//! Test database setup.

use fortuna::adapters::sqlite::SqliteStore;
use sqlx::SqlitePool;

pub async fn setup_test_db() -> SqlitePool {
    SqliteStore::open_in_memory().await.expect("failed to open in-memory store").pool()
}
