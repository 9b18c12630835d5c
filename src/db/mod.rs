use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::Error;
use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod memory;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use memory::MemoryDatabase;
pub use repositories::{Database, PgDatabase, Session};

/// Connect the configured backend and run migrations if asked to
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>> {
    match config.backend {
        DatabaseBackend::Memory => {
            info!("Using in-memory database; state is lost on restart");
            Ok(Arc::new(MemoryDatabase::new()))
        }
        DatabaseBackend::Postgres => {
            info!("Initializing Database service");

            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(&config.url)
                .await
                .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

            info!("Connected to PostgreSQL database");

            if config.auto_migrate {
                info!("Running database migrations");
                migrations::run_migrations(&pool)
                    .await
                    .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;
                info!("Database migrations completed successfully");
            }

            Ok(Arc::new(PgDatabase::new(Arc::new(pool))))
        }
    }
}
