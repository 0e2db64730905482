//! Server configuration
//!
//! All settings come from environment variables (a `.env` file is loaded at
//! startup). Secrets must be set explicitly outside development.
//!
//! | Variable | Default | Notes |
//! |----------|---------|-------|
//! | DATABASE_URL | — | required, PostgreSQL URL |
//! | HTTP_PORT | 5000 | |
//! | JWT_SECRET | dev placeholder | required in non-development |
//! | JWT_EXPIRATION_MINUTES | 1440 | |
//! | STRIPE_SECRET_KEY | dev placeholder | required in non-development |
//! | ENVIRONMENT | development | development \| staging \| production |

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP API port
    pub http_port: u16,
    /// JWT signing secret
    pub jwt_secret: String,
    /// Token lifetime in minutes
    pub jwt_expiration_minutes: i64,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty outside development.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1440),
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_secret_falls_back_in_development() {
        let val = Config::require_secret("TEST_SECRET_THAT_IS_UNSET", "development")
            .expect("development fallback");
        assert!(val.starts_with("dev-"));
    }

    #[test]
    fn require_secret_fails_in_production() {
        let err = Config::require_secret("TEST_SECRET_THAT_IS_UNSET", "production");
        assert!(err.is_err());
    }
}
