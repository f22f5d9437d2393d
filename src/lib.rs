//! Coin Watch - availability monitor for the National Bank of Ukraine coin shop
//!
//! Periodically snapshots the shop's catalog, reconciles it against a local
//! store, and announces new and back-in-stock coins.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::{CatalogMonitor, CycleOutcome, Scheduler};
use crate::domain::{PageFetcher, ProductRepository};
use crate::infrastructure::{
    AppConfig, DatabaseConnection, HttpClient, HttpClientConfig, SqliteProductRepository, build_notifier,
};

/// Construct every collaborator from configuration
pub async fn build_monitor(config: &AppConfig) -> Result<CatalogMonitor> {
    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open the product database")?;
    db.migrate().await.context("Failed to prepare the database schema")?;

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpClient::new(HttpClientConfig::from(&config.crawling))?);
    let repository: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(db.pool().clone()));
    let notifier = build_notifier(&config.notifier)?;

    CatalogMonitor::from_config(config, fetcher, repository, notifier).context("Invalid catalog parsing setup")
}

/// Run the monitor until Ctrl-C, or a single cycle with `scheduler.run_once`
pub async fn run(config: AppConfig) -> Result<()> {
    let monitor = Arc::new(build_monitor(&config).await?);
    info!("🪙 Monitoring {}", config.catalog.catalog_url());

    if config.scheduler.run_once {
        return match monitor.run_cycle().await? {
            CycleOutcome::Completed(summary) => {
                info!(
                    "Single cycle done: {} new, {} returned, {} notifications failed",
                    summary.report.new_products.len(),
                    summary.report.returned_products.len(),
                    summary.notifications_failed
                );
                let report = serde_json::to_string(&summary.report).context("Failed to serialize cycle report")?;
                println!("{report}");
                Ok(())
            }
            CycleOutcome::Skipped => Ok(()),
        };
    }

    let scheduler = Scheduler::new(monitor, &config.scheduler);
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
