//! Database access layer
//!
//! PostgreSQL via sqlx. One module per entity, free functions taking a pool
//! or an open transaction.

pub mod orders;
pub mod products;
pub mod users;
pub mod wishlist;

use crate::error::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect to PostgreSQL and run pending migrations
pub async fn connect(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;

    tracing::info!("Database connection established, migrations applied");

    Ok(pool)
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
