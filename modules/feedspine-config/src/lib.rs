//! Environment-driven configuration for a FeedSpine process, loaded the
//! way `rootsignal-core::config::AppConfig` loads secrets from the
//! environment (`.env` via `dotenvy`, typed env vars with explicit
//! defaults). See SPEC_FULL.md §0.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is set but not valid: {1}")]
    InvalidValue(&'static str, String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which `tracing-subscriber` formatter to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// Structured JSON, for production log aggregation.
    Json,
}

/// Process-wide configuration for a FeedSpine collection run.
#[derive(Debug, Clone)]
pub struct FeedSpineConfig {
    /// Postgres connection string for `PostgresStorage`. Absent means the
    /// caller intends to use `InMemoryStorage` instead.
    pub database_url: Option<String>,
    pub http_timeout: Duration,
    pub http_max_retries: u32,
    pub rate_limit_rps: f64,
    pub checkpoint_dir: String,
    pub checkpoint_save_interval: u64,
    pub log_format: LogFormat,
}

impl Default for FeedSpineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            http_timeout: Duration::from_secs(30),
            http_max_retries: 3,
            rate_limit_rps: 10.0,
            checkpoint_dir: "./checkpoints".to_string(),
            checkpoint_save_interval: 100,
            log_format: LogFormat::Pretty,
        }
    }
}

impl FeedSpineConfig {
    /// Load configuration from the environment, falling back to
    /// `Default::default()` for anything unset. Reads a `.env` file in the
    /// working directory if present (mirrors `AppConfig::from_env`'s
    /// `dotenvy::dotenv().ok()` call — missing `.env` is not an error).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let http_timeout = match std::env::var("HTTP_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| ConfigError::InvalidValue("HTTP_TIMEOUT_SECS", v))?,
            ),
            Err(_) => defaults.http_timeout,
        };

        let http_max_retries = match std::env::var("HTTP_MAX_RETRIES") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_MAX_RETRIES", v))?,
            Err(_) => defaults.http_max_retries,
        };

        let rate_limit_rps = match std::env::var("RATE_LIMIT_RPS") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATE_LIMIT_RPS", v))?,
            Err(_) => defaults.rate_limit_rps,
        };

        let checkpoint_save_interval = match std::env::var("CHECKPOINT_SAVE_INTERVAL") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CHECKPOINT_SAVE_INTERVAL", v))?,
            Err(_) => defaults.checkpoint_save_interval,
        };

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") | Err(_) => LogFormat::Pretty,
            Ok(other) => return Err(ConfigError::InvalidValue("LOG_FORMAT", other.to_string())),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            http_timeout,
            http_max_retries,
            rate_limit_rps,
            checkpoint_dir: std::env::var("CHECKPOINT_DIR").unwrap_or(defaults.checkpoint_dir),
            checkpoint_save_interval,
            log_format,
        })
    }

    fn preview_database_url(&self) -> String {
        match &self.database_url {
            Some(url) => {
                let n = url.len().min(12);
                format!("{}...({} chars)", &url[..n], url.len())
            }
            None => "<not set, using in-memory storage>".to_string(),
        }
    }

    /// Log the resolved configuration at startup (secrets previewed, not
    /// printed in full), matching `AppConfig::log_keys`'s style.
    pub fn log_summary(&self) {
        tracing::info!("FeedSpine config loaded:");
        tracing::info!("  DATABASE_URL: {}", self.preview_database_url());
        tracing::info!("  HTTP_TIMEOUT_SECS: {}", self.http_timeout.as_secs());
        tracing::info!("  HTTP_MAX_RETRIES: {}", self.http_max_retries);
        tracing::info!("  RATE_LIMIT_RPS: {}", self.rate_limit_rps);
        tracing::info!("  CHECKPOINT_DIR: {}", self.checkpoint_dir);
        tracing::info!("  CHECKPOINT_SAVE_INTERVAL: {}", self.checkpoint_save_interval);
    }
}

/// Install a global `tracing` subscriber per `log_format`, reading level
/// filters from `RUST_LOG` via `EnvFilter` (teacher convention: every
/// binary in `rootsignal-*` installs its subscriber this way at startup).
pub fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);

    match format {
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        LogFormat::Pretty => {
            let _ = subscriber.try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_env() {
        let cfg = FeedSpineConfig::default();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.http_max_retries, 3);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }
}
