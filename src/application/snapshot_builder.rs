//! Catalog snapshot assembly
//!
//! Fetches the first catalog page, discovers the remaining pages, fetches
//! those concurrently under a semaphore and merges every page's purchasable
//! listings into one de-duplicated snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::domain::product::ProductListing;
use crate::domain::services::{FetchError, PageFetcher};
use crate::infrastructure::parsing::{
    ExtractionReport, PaginationParser, ParsingConfig, ParsingResult, ProductListParser,
};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("First catalog page unavailable: {0}")]
    FirstPage(#[source] FetchError),
}

/// Purchasable listings observed in one pass over the catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Unique by external id, first occurrence kept
    pub products: Vec<ProductListing>,
    pub pages_total: usize,
    pub pages_failed: usize,
    pub rejected_listings: usize,
    pub skipped_unavailable: usize,
}

impl CatalogSnapshot {
    pub fn is_complete(&self) -> bool {
        self.pages_failed == 0
    }
}

/// Outcome of fetching and extracting one page
enum PageOutcome {
    Extracted(ExtractionReport),
    Failed,
}

pub struct CatalogSnapshotBuilder {
    fetcher: Arc<dyn PageFetcher>,
    list_parser: Arc<ProductListParser>,
    pagination_parser: PaginationParser,
    catalog_url: String,
    max_concurrent_pages: usize,
}

impl CatalogSnapshotBuilder {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        parsing_config: &ParsingConfig,
        max_concurrent_pages: usize,
    ) -> ParsingResult<Self> {
        Ok(Self {
            fetcher,
            list_parser: Arc::new(ProductListParser::with_config(parsing_config)?),
            pagination_parser: PaginationParser::with_config(parsing_config)?,
            catalog_url: parsing_config.catalog_url.clone(),
            max_concurrent_pages: max_concurrent_pages.max(1),
        })
    }

    pub async fn build_snapshot(&self) -> Result<CatalogSnapshot, SnapshotError> {
        let first_page = self
            .fetcher
            .fetch(&self.catalog_url)
            .await
            .map_err(SnapshotError::FirstPage)?;

        let additional_pages = self.pagination_parser.discover_pages(&first_page);
        let first_report = self.list_parser.extract_report(&first_page);
        drop(first_page);

        info!("📄 Catalog has {} pages", additional_pages.len() + 1);

        let mut reports = vec![PageOutcome::Extracted(first_report)];
        reports.extend(self.fetch_pages(additional_pages).await);

        Ok(merge(reports))
    }

    async fn fetch_pages(&self, urls: Vec<String>) -> Vec<PageOutcome> {
        if urls.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_pages));
        debug!(
            "🚀 Fetching {} pages with semaphore control (max: {})",
            urls.len(),
            self.max_concurrent_pages
        );

        let tasks: Vec<_> = urls
            .into_iter()
            .map(|url| {
                let fetcher = Arc::clone(&self.fetcher);
                let parser = Arc::clone(&self.list_parser);
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        error!("Failed to acquire semaphore permit for {}", url);
                        return PageOutcome::Failed;
                    };

                    match fetcher.fetch(&url).await {
                        Ok(markup) => PageOutcome::Extracted(parser.extract_report(&markup)),
                        Err(e) => {
                            warn!("⚠️ Catalog page skipped: {}", e);
                            PageOutcome::Failed
                        }
                    }
                })
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    error!("Catalog page task failed: {}", e);
                    PageOutcome::Failed
                })
            })
            .collect()
    }
}

/// Concatenate page results in page order, keeping the first listing per id
fn merge(outcomes: Vec<PageOutcome>) -> CatalogSnapshot {
    let mut snapshot = CatalogSnapshot {
        pages_total: outcomes.len(),
        ..CatalogSnapshot::default()
    };
    let mut seen = HashSet::new();

    for outcome in outcomes {
        let report = match outcome {
            PageOutcome::Extracted(report) => report,
            PageOutcome::Failed => {
                snapshot.pages_failed += 1;
                continue;
            }
        };

        if let Some(missing) = &report.container_missing {
            warn!("⚠️ {}", missing);
        }
        for rejection in &report.rejected {
            warn!("Listing dropped: {}", rejection);
        }
        snapshot.rejected_listings += report.rejected.len();
        snapshot.skipped_unavailable += report.skipped_unavailable;

        for product in report.products {
            if seen.insert(product.external_id) {
                snapshot.products.push(product);
            } else {
                debug!("Duplicate listing {} ignored", product.external_id);
            }
        }
    }

    info!(
        "📦 Snapshot: {} available products from {}/{} pages ({} rejected)",
        snapshot.products.len(),
        snapshot.pages_total - snapshot.pages_failed,
        snapshot.pages_total,
        snapshot.rejected_listings
    );
    snapshot
}
