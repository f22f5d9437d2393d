//! Infrastructure layer for the database, catalog parsing, and external integrations
//!
//! Concrete implementations of the domain collaborator traits plus the
//! configuration and logging setup the binary wires them with.

pub mod config; // Layered settings
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod parsing_error;
pub mod product_repository;
pub mod telegram_notifier;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, nbu_shop};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{PaginationParser, ParsingConfig, ParsingError, ParsingResult, ProductListParser};
pub use product_repository::SqliteProductRepository;
pub use telegram_notifier::{LogOnlyNotifier, TelegramNotifier, build_notifier};
