use anyhow::{Context, Result};
use coin_watch_lib::infrastructure::{ConfigManager, init_logging_with_config, logging::log_system_info};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config_manager = ConfigManager::new();
    let config = config_manager
        .load()
        .with_context(|| format!("Failed to load configuration from {}", config_manager.config_path().display()))?;

    init_logging_with_config(&config.logging)?;
    log_system_info();

    coin_watch_lib::run(config).await
}
