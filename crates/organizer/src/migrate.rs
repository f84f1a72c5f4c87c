use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;

/// Create the enrichment table. Idempotent; `categories` and `tags` hold
/// JSON arrays as TEXT.
pub async fn run_migrations(config: &Config, pool: &SqlitePool) -> Result<()> {
    let table = &config.warehouse.table;
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            image TEXT NOT NULL,
            title TEXT,
            categories TEXT,
            description TEXT,
            tags TEXT
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}
