//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::JwtService;
use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::metrics::Metrics;

/// Shared application state — cheap to clone, one instance per process
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Server configuration
    pub config: Config,
    /// JWT token service
    pub jwt: Arc<JwtService>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Connect the pool, run migrations and wire up services
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let pool = db::connect(&config.database_url).await?;
        let jwt = Arc::new(JwtService::new(
            &config.jwt_secret,
            config.jwt_expiration_minutes,
        ));

        Ok(Self {
            pool,
            config,
            jwt,
            metrics: Arc::new(Metrics::new()),
        })
    }
}
