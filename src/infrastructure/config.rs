//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate:
//! 1. Built-in defaults (`defaults` module)
//! 2. Optional TOML file (`config/default.toml`, or the path in `COIN_WATCH_CONFIG`)
//! 3. Environment variables, e.g. `COIN_WATCH__NOTIFIER__BOT_TOKEN`

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {field} - {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub crawling: CrawlingConfig,
    pub reconciliation: ReconciliationConfig,
    pub scheduler: SchedulerConfig,
    pub database: DatabaseConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

/// Location of the monitored catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Shop root, used to resolve relative links
    pub base_url: String,

    /// First catalog page, relative to `base_url`
    pub catalog_path: String,
}

/// HTTP behaviour of the page fetcher and snapshot fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    /// Browser identity sent with every request (the shop blocks non-browser clients)
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Maximum catalog pages fetched concurrently
    pub max_concurrent_pages: usize,

    /// Whether to follow redirects
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Items unseen for longer than this are presumed sold out
    pub staleness_threshold_seconds: u64,

    /// Require a year of production for a listing to be accepted
    pub require_year: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between reconciliation cycles
    pub interval_seconds: u64,

    /// Run a cycle immediately at startup instead of waiting one interval
    pub run_on_startup: bool,

    /// Run exactly one cycle and exit
    pub run_once: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,

    pub max_connections: u32,
}

/// Telegram Bot API settings. Without a token, notifications are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub bot_token: Option<String>,

    /// Channel or chat receiving the alerts
    pub chat_id: Option<String>,

    pub api_base_url: String,

    pub request_timeout_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub directory: Option<PathBuf>,

    /// Log file rotation: "daily" or "never"
    pub rotation: String,

    /// Offset applied to log timestamps (hours east of UTC)
    pub utc_offset_hours: i32,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: nbu_shop::BASE_URL.to_string(),
            catalog_path: nbu_shop::CATALOG_PATH.to_string(),
        }
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_concurrent_pages: defaults::MAX_CONCURRENT_PAGES,
            follow_redirects: true,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_seconds: defaults::STALENESS_THRESHOLD_SECONDS,
            require_year: true,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: defaults::SCHEDULER_INTERVAL_SECONDS,
            run_on_startup: true,
            run_once: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: ConfigManager::default_database_url(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base_url: defaults::TELEGRAM_API_BASE_URL.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            directory: None,
            rotation: defaults::LOG_ROTATION.to_string(),
            utc_offset_hours: defaults::LOG_UTC_OFFSET_HOURS,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl CatalogConfig {
    /// Absolute URL of the first catalog page
    pub fn catalog_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.catalog_path.trim_start_matches('/')
        )
    }
}

impl ReconciliationConfig {
    pub fn staleness_threshold(&self) -> chrono::Duration {
        i64::try_from(self.staleness_threshold_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl SchedulerConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl AppConfig {
    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.catalog.base_url).is_err() {
            return Err(ConfigError::invalid("catalog.base_url", "must be an absolute URL"));
        }
        if self.crawling.request_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "crawling.request_timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.crawling.max_concurrent_pages == 0 {
            return Err(ConfigError::invalid(
                "crawling.max_concurrent_pages",
                "must be greater than 0",
            ));
        }
        if self.reconciliation.staleness_threshold_seconds == 0 {
            return Err(ConfigError::invalid(
                "reconciliation.staleness_threshold_seconds",
                "must be greater than 0",
            ));
        }
        if self.reconciliation.staleness_threshold_seconds > defaults::MAX_STALENESS_THRESHOLD_SECONDS {
            return Err(ConfigError::invalid(
                "reconciliation.staleness_threshold_seconds",
                "must not exceed one year",
            ));
        }
        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "scheduler.interval_seconds",
                "must be greater than 0",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be greater than 0",
            ));
        }
        if self.notifier.bot_token.is_some() && self.notifier.chat_id.is_none() {
            return Err(ConfigError::invalid(
                "notifier.chat_id",
                "required when notifier.bot_token is set",
            ));
        }
        Ok(())
    }
}

/// Configuration manager for loading layered settings
#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Config file from `COIN_WATCH_CONFIG`, or `config/default.toml`
    pub fn new() -> Self {
        let config_path = std::env::var(defaults::CONFIG_PATH_ENV)
            .map_or_else(|_| PathBuf::from(defaults::CONFIG_FILE), PathBuf::from);
        Self { config_path }
    }

    pub const fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Application data directory (database lives here by default)
    pub fn get_app_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(defaults::APP_DIR_NAME))
    }

    fn default_database_url() -> String {
        Self::get_app_data_dir().map_or_else(
            || format!("sqlite:{}", defaults::DB_FILE_NAME),
            |dir| format!("sqlite:{}", dir.join(defaults::DB_FILE_NAME).display()),
        )
    }

    /// Load defaults, then the optional file, then environment overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(self.config_path.clone()).required(false))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        info!("Loaded configuration (file: {:?})", self.config_path);
        Ok(config)
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// NBU numismatic shop URLs
pub mod nbu_shop {
    /// Shop root
    pub const BASE_URL: &str = "https://coins.bank.gov.ua/";

    /// Catalog entry page (page 1)
    pub const CATALOG_PATH: &str = "catalog.html";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "coin-watch";

    pub const DB_FILE_NAME: &str = "coin_watch.db";

    pub const CONFIG_FILE: &str = "config/default.toml";

    pub const CONFIG_PATH_ENV: &str = "COIN_WATCH_CONFIG";

    pub const ENV_PREFIX: &str = "COIN_WATCH";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// The catalog has a handful of pages; keep the fan-out polite
    pub const MAX_CONCURRENT_PAGES: usize = 4;

    pub const STALENESS_THRESHOLD_SECONDS: u64 = 300;
    pub const MAX_STALENESS_THRESHOLD_SECONDS: u64 = 365 * 24 * 60 * 60;

    pub const SCHEDULER_INTERVAL_SECONDS: u64 = 60;

    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_ROTATION: &str = "daily";

    /// Kyiv standard time
    pub const LOG_UTC_OFFSET_HOURS: i32 = 2;
}
