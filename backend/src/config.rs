//! Configuration management for the Pharmaceutical Inventory Tracker
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with PIT_ prefix (`PIT__DATABASE__URL`)
//!
//! `DATABASE_URL` and `OPENAI_API_KEY` are honored as defaults so existing
//! deployments keep working without renaming their variables.

use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use shared::{validate_alpha, validate_expiry_window_days, validate_snapshot_type};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Hosted chat-completion service used for narratives
    pub narrative: NarrativeConfig,

    /// Forecast engine parameters
    pub forecast: ForecastConfig,

    /// Weekly report parameters
    pub report: ReportConfig,

    /// Scheduled snapshot capture
    pub snapshots: SnapshotScheduleConfig,

    /// CORS policy
    pub cors: CorsConfig,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NarrativeConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Chat model name
    pub model: String,

    /// Timeout in seconds for connecting and single completions, and the longest gap between stream chunks
    pub timeout_secs: u64,

    /// Keep-alive interval for streamed responses, in seconds
    pub heartbeat_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// Exponential smoothing factor in (0, 1]
    pub alpha: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Snapshot type captured at the start of a week
    pub opening_snapshot_type: String,

    /// Snapshot type captured at the end of a week
    pub closing_snapshot_type: String,

    /// Days ahead to look for expiring batches
    pub expiry_window_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotScheduleConfig {
    /// Run the background capture task
    pub schedule_enabled: bool,

    pub opening: CheckpointConfig,

    pub closing: CheckpointConfig,
}

/// A weekly capture time, in UTC
#[derive(Debug, Deserialize, Clone)]
pub struct CheckpointConfig {
    /// Weekday name, e.g. `mon` or `sunday`
    pub weekday: String,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin without credentials
    pub allowed_origins: Vec<String>,

    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    pub format: String,

    /// Fallback filter when `RUST_LOG` is unset
    pub filter: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("PIT_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PIT prefix)
            .add_source(
                Environment::with_prefix("PIT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }

    /// Builder pre-populated with every default value
    fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("narrative.api_base", "https://api.openai.com/v1")?
            .set_default("narrative.api_key", "")?
            .set_default("narrative.model", "gpt-4o-mini")?
            .set_default("narrative.timeout_secs", 120)?
            .set_default("narrative.heartbeat_secs", 15)?
            .set_default("forecast.alpha", shared::DEFAULT_ALPHA)?
            .set_default("report.opening_snapshot_type", "weekly_opening")?
            .set_default("report.closing_snapshot_type", "weekly_closing")?
            .set_default(
                "report.expiry_window_days",
                i64::from(shared::DEFAULT_EXPIRY_WINDOW_DAYS),
            )?
            .set_default("snapshots.schedule_enabled", false)?
            .set_default("snapshots.opening.weekday", "mon")?
            .set_default("snapshots.opening.hour", 0)?
            .set_default("snapshots.opening.minute", 5)?
            .set_default("snapshots.closing.weekday", "sun")?
            .set_default("snapshots.closing.hour", 23)?
            .set_default("snapshots.closing.minute", 55)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("cors.allow_credentials", true)?
            .set_default("logging.format", "pretty")?
            .set_default(
                "logging.filter",
                "pit_server=debug,pharma_inventory_backend=debug,tower_http=debug,sqlx=warn",
            )?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_default("database.url", url)?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            builder = builder.set_default("narrative.api_key", key)?;
        }

        Ok(builder)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, msg: &str| ConfigError::Message(format!("{}: {}", key, msg));

        validate_alpha(self.forecast.alpha).map_err(|m| invalid("forecast.alpha", m))?;
        validate_expiry_window_days(self.report.expiry_window_days)
            .map_err(|m| invalid("report.expiry_window_days", m))?;
        validate_snapshot_type(&self.report.opening_snapshot_type)
            .map_err(|m| invalid("report.opening_snapshot_type", m))?;
        validate_snapshot_type(&self.report.closing_snapshot_type)
            .map_err(|m| invalid("report.closing_snapshot_type", m))?;

        if self.report.opening_snapshot_type == self.report.closing_snapshot_type {
            return Err(invalid(
                "report.closing_snapshot_type",
                "must differ from report.opening_snapshot_type",
            ));
        }
        if self.narrative.heartbeat_secs == 0 {
            return Err(invalid("narrative.heartbeat_secs", "must be at least 1"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(invalid(
                "database.min_connections",
                "must not exceed database.max_connections",
            ));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let mut builder = Config::defaults("test")?.set_override("database.url", "postgres://localhost/pit")?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = build(&[]).unwrap();
        assert_eq!(config.environment, "test");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.forecast.alpha, 0.4);
        assert_eq!(config.report.expiry_window_days, 30);
        assert_eq!(config.narrative.model, "gpt-4o-mini");
        assert!(!config.snapshots.schedule_enabled);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.is_development());
    }

    #[test]
    fn test_rejects_out_of_range_alpha() {
        assert!(build(&[("forecast.alpha", "0")]).is_err());
        assert!(build(&[("forecast.alpha", "1.2")]).is_err());
        assert!(build(&[("forecast.alpha", "1.0")]).is_ok());
    }

    #[test]
    fn test_rejects_identical_snapshot_kinds() {
        let result = build(&[
            ("report.opening_snapshot_type", "weekly"),
            ("report.closing_snapshot_type", "weekly"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_heartbeat() {
        assert!(build(&[("narrative.heartbeat_secs", "0")]).is_err());
    }
}
