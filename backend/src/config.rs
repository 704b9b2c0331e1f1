//! Configuration management for the warehouse dispatch platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with ALMACEN_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::codes::DEFAULT_ITEM_CODE_RETRIES;
use shared::reconcile::OverDispatchPolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Dispatch engine behaviour
    pub dispatch: DispatchConfig,

    /// Item code generation
    pub codes: CodesConfig,

    /// Critical stock alerting
    pub alerts: AlertsConfig,
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
    /// PostgreSQL connection URL, or `memory:` for the in-process store
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory:")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// What happens when a dispatch exceeds a line's remaining quantity
    pub over_dispatch: OverDispatchPolicy,

    /// Whether manual (scan-less) dispatch is accepted
    pub manual_enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CodesConfig {
    /// Random draws before a BIEN/KIT code allocation gives up
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Addresses that receive critical stock alerts
    #[serde(default)]
    pub recipients: Vec<String>,

    /// SMTP relay; alerts are only logged when absent
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

fn default_starttls() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("ALMACEN_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "memory:")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("dispatch.over_dispatch", "reject")?
            .set_default("dispatch.manual_enabled", true)?
            .set_default("codes.max_retries", i64::from(DEFAULT_ITEM_CODE_RETRIES))?
            .set_default("alerts.recipients", Vec::<String>::new())?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ALMACEN_ prefix)
            .add_source(
                Environment::with_prefix("ALMACEN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("alerts.recipients")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration for tests and the in-memory store
    pub fn in_memory() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
            },
            dispatch: DispatchConfig {
                over_dispatch: OverDispatchPolicy::Reject,
                manual_enabled: true,
            },
            codes: CodesConfig {
                max_retries: DEFAULT_ITEM_CODE_RETRIES,
            },
            alerts: AlertsConfig {
                recipients: Vec::new(),
                smtp: None,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
