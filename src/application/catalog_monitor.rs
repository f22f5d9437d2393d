//! One monitoring cycle: snapshot, reconcile, notify
//!
//! Overlapping triggers are skipped rather than queued. Notifications go
//! out only after the store has been updated, so a delivery failure never
//! undoes a transition. When the store fails part way through, the
//! transitions it already committed are still announced.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::application::reconciliation::{ReconciliationEngine, ReconciliationFailure, ReconciliationReport};
use crate::application::snapshot_builder::{CatalogSnapshotBuilder, SnapshotError};
use crate::domain::repositories::ProductRepository;
use crate::domain::services::{PageFetcher, ProductNotifier};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::parsing::{ParsingConfig, ParsingResult};

#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Storage(#[from] ReconciliationFailure),
}

#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub report: ReconciliationReport,
    pub pages_total: usize,
    pub pages_failed: usize,
    pub rejected_listings: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    /// Another cycle was still running
    Skipped,
}

impl CycleOutcome {
    pub fn summary(&self) -> Option<&CycleSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::Skipped => None,
        }
    }
}

pub struct CatalogMonitor {
    snapshot_builder: CatalogSnapshotBuilder,
    engine: ReconciliationEngine,
    notifier: Arc<dyn ProductNotifier>,
    cycle_lock: Mutex<()>,
}

impl CatalogMonitor {
    pub fn new(
        snapshot_builder: CatalogSnapshotBuilder,
        engine: ReconciliationEngine,
        notifier: Arc<dyn ProductNotifier>,
    ) -> Self {
        Self {
            snapshot_builder,
            engine,
            notifier,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Wire a monitor from application settings and explicit collaborators
    pub fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        repository: Arc<dyn ProductRepository>,
        notifier: Arc<dyn ProductNotifier>,
    ) -> ParsingResult<Self> {
        let parsing_config = ParsingConfig::from_app_config(config);
        let snapshot_builder =
            CatalogSnapshotBuilder::new(fetcher, &parsing_config, config.crawling.max_concurrent_pages)?;
        let engine = ReconciliationEngine::new(repository, config.reconciliation.staleness_threshold());

        Ok(Self::new(snapshot_builder, engine, notifier))
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            info!("⏭️ Previous cycle still running, trigger skipped");
            return Ok(CycleOutcome::Skipped);
        };

        let started = Instant::now();
        info!("🔍 Catalog check started");

        let snapshot = self.snapshot_builder.build_snapshot().await?;
        let report = match self.engine.reconcile(&snapshot).await {
            Ok(report) => report,
            Err(failure) => {
                // Transitions committed before the failure are not seen again
                let (sent, failed) = self.dispatch(&failure.committed).await;
                error!(
                    "❌ {} ({} committed transitions announced, {} failed)",
                    failure, sent, failed
                );
                return Err(failure.into());
            }
        };
        let (notifications_sent, notifications_failed) = self.dispatch(&report).await;

        let summary = CycleSummary {
            report,
            pages_total: snapshot.pages_total,
            pages_failed: snapshot.pages_failed,
            rejected_listings: snapshot.rejected_listings,
            notifications_sent,
            notifications_failed,
            duration: started.elapsed(),
        };

        info!(
            "✅ Catalog check finished in {:?}: {} new, {} returned, {} sold out",
            summary.duration,
            summary.report.new_products.len(),
            summary.report.returned_products.len(),
            summary.report.aged_out.len()
        );
        Ok(CycleOutcome::Completed(summary))
    }

    /// Deliver one message per transition; failures are only logged
    async fn dispatch(&self, report: &ReconciliationReport) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;

        for product in &report.new_products {
            match self.notifier.notify_new(product).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    error!("Failed to notify about new product {}: {}", product.external_id, e);
                    failed += 1;
                }
            }
        }

        for product in &report.returned_products {
            match self.notifier.notify_returned(product).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    error!("Failed to notify about returned product {}: {}", product.external_id, e);
                    failed += 1;
                }
            }
        }

        (sent, failed)
    }
}
