//! Timer-driven cycle trigger with graceful shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::application::catalog_monitor::{CatalogMonitor, CycleOutcome};
use crate::infrastructure::config::SchedulerConfig;

pub struct Scheduler {
    monitor: Arc<CatalogMonitor>,
    interval: Duration,
    run_on_startup: bool,
}

impl Scheduler {
    pub fn new(monitor: Arc<CatalogMonitor>, config: &SchedulerConfig) -> Self {
        Self {
            monitor,
            interval: config.interval(),
            run_on_startup: config.run_on_startup,
        }
    }

    /// Trigger a cycle every interval until `shutdown` resolves.
    ///
    /// Cycles run on their own task; a tick that lands while one is still
    /// running is skipped by the monitor. Every cycle task still running at
    /// shutdown is awaited before returning.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.run_on_startup {
            // The first tick completes immediately
            ticker.tick().await;
        }

        info!("⏰ Scheduler started (interval: {:?})", self.interval);
        tokio::pin!(shutdown);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("🛑 Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    in_flight.retain(|handle| !handle.is_finished());
                    in_flight.push(self.trigger());
                }
            }
        }

        in_flight.retain(|handle| !handle.is_finished());
        if !in_flight.is_empty() {
            info!("Waiting for the running cycle to finish");
        }
        for handle in in_flight {
            if let Err(e) = handle.await {
                error!("Cycle task failed during shutdown: {}", e);
            }
        }
        info!("Scheduler stopped");
    }

    fn trigger(&self) -> JoinHandle<()> {
        let monitor = Arc::clone(&self.monitor);
        tokio::spawn(async move {
            match monitor.run_cycle().await {
                Ok(CycleOutcome::Completed(summary)) if summary.pages_failed > 0 => {
                    warn!(
                        "⚠️ Cycle completed with {}/{} catalog pages unavailable",
                        summary.pages_failed, summary.pages_total
                    );
                }
                Ok(_) => {}
                Err(e) => error!("❌ Cycle aborted: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ProductListing;
    use crate::domain::services::{FetchError, NotificationError, PageFetcher, ProductNotifier};
    use crate::infrastructure::config::AppConfig;
    use crate::infrastructure::{DatabaseConnection, SqliteProductRepository};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Timeout { url: url.to_string() })
        }
    }

    /// Each fetch takes longer than the scheduler interval
    struct SlowFetcher {
        delay: Duration,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for SlowFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Timeout { url: url.to_string() })
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl ProductNotifier for SilentNotifier {
        async fn notify_new(&self, _: &ProductListing) -> Result<(), NotificationError> {
            Ok(())
        }

        async fn notify_returned(&self, _: &ProductListing) -> Result<(), NotificationError> {
            Ok(())
        }
    }

    async fn monitor_with(fetcher: Arc<dyn PageFetcher>) -> CatalogMonitor {
        let db = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        CatalogMonitor::from_config(
            &AppConfig::default(),
            fetcher,
            Arc::new(SqliteProductRepository::new(db.pool().clone())),
            Arc::new(SilentNotifier),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_scheduler_keeps_running_after_failed_cycles() {
        let fetcher = Arc::new(CountingFetcher::default());
        let shared: Arc<dyn PageFetcher> = fetcher.clone();

        let scheduler = Scheduler {
            monitor: Arc::new(monitor_with(shared).await),
            interval: Duration::from_millis(40),
            run_on_startup: true,
        };
        scheduler.run(tokio::time::sleep(Duration::from_millis(150))).await;

        assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_cycle_outlasting_skipped_ticks() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_millis(200),
            finished: AtomicUsize::new(0),
        });
        let shared: Arc<dyn PageFetcher> = fetcher.clone();

        let scheduler = Scheduler {
            monitor: Arc::new(monitor_with(shared).await),
            interval: Duration::from_millis(40),
            run_on_startup: true,
        };
        scheduler.run(tokio::time::sleep(Duration::from_millis(100))).await;

        assert_eq!(fetcher.finished.load(Ordering::SeqCst), 1);
    }
}
