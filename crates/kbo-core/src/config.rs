//! Environment-variable configuration, with an optional `.env` file loaded
//! first via `dotenvy`. No value here has a safe default: a missing required
//! variable fails startup rather than silently falling back to something
//! that would point at the wrong database.

use crate::error::KboError;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct KboConfig {
    pub db_host: String,
    pub db_port: u16,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_db: String,
    pub redis_url: String,
    pub csv_dir: String,
}

impl KboConfig {
    /// Load configuration from the environment, loading a `.env` file first
    /// if one is present. Fails with [`KboError::InvalidParameter`] naming
    /// the first missing variable.
    pub fn from_env() -> Result<Self, KboError> {
        let _ = dotenvy::dotenv();

        let db_host = required_env("DB_HOST")?;
        let db_port = required_env("DB_PORT")?
            .parse::<u16>()
            .map_err(|e| KboError::InvalidParameter(format!("DB_PORT: {e}")))?;
        let postgres_user = required_env("POSTGRES_USER")?;
        let postgres_password = required_env("POSTGRES_PASSWORD")?;
        let postgres_db = required_env("POSTGRES_DB")?;
        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| {
            let default = "redis://localhost:6379".to_string();
            tracing::debug!(default = %default, "REDIS_URL not set, using default");
            default
        });
        let csv_dir = std::env::var("CSV_DIR").unwrap_or_else(|_| {
            let default = "../bce_mai_2025".to_string();
            tracing::debug!(default = %default, "CSV_DIR not set, using default");
            default
        });

        Ok(Self {
            db_host,
            db_port,
            postgres_user,
            postgres_password,
            postgres_db,
            redis_url,
            csv_dir,
        })
    }

    /// Postgres connection string suitable for `tokio_postgres::connect`.
    pub fn postgres_conn_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.db_host, self.db_port, self.postgres_user, self.postgres_password, self.postgres_db
        )
    }
}

fn required_env(key: &str) -> Result<String, KboError> {
    std::env::var(key)
        .map_err(|_| KboError::InvalidParameter(format!("missing required env var {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't race under `cargo test`'s default thread pool.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_var_fails_fast() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in ["DB_HOST", "DB_PORT", "POSTGRES_USER", "POSTGRES_PASSWORD", "POSTGRES_DB"] {
            std::env::remove_var(key);
        }
        assert!(KboConfig::from_env().is_err());
    }

    #[test]
    fn all_required_vars_present_succeeds() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DB_HOST", "localhost");
        std::env::set_var("DB_PORT", "5432");
        std::env::set_var("POSTGRES_USER", "kbo");
        std::env::set_var("POSTGRES_PASSWORD", "secret");
        std::env::set_var("POSTGRES_DB", "kbo");
        let cfg = KboConfig::from_env().expect("config should load");
        assert_eq!(cfg.db_port, 5432);
        assert_eq!(cfg.redis_url, "redis://localhost:6379");
        for key in ["DB_HOST", "DB_PORT", "POSTGRES_USER", "POSTGRES_PASSWORD", "POSTGRES_DB"] {
            std::env::remove_var(key);
        }
    }
}
