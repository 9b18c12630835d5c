use anyhow::Result;
use sqlx::{Executor, PgPool};
use tracing::info;

/// Schema scripts in application order. Every statement is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_init.sql", include_str!("sql/001_init.sql")),
    ("002_add_indexes.sql", include_str!("sql/002_add_indexes.sql")),
];

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        pool.execute(*sql).await?;
        info!("Applied migration: {}", name);
    }

    Ok(())
}
