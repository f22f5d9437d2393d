//! Snapshot reconciliation against the product store
//!
//! One pass per cycle classifies every observed listing as NEW, RETURNED or
//! STILL-AVAILABLE, refreshes observed rows, ages out items that have not
//! been seen for longer than the staleness threshold, and inserts the new
//! ones. Notifications are the caller's business and happen afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::snapshot_builder::CatalogSnapshot;
use crate::domain::product::{
    ExternalId, ProductFilter, ProductListing, ProductRecord, ProductState, ProductUpdate, StoredProduct,
};
use crate::domain::repositories::{ProductRepository, StorageError, StorageResult};

/// Partition of one snapshot against the stored rows
#[derive(Debug, Default)]
pub struct Classification<'a> {
    pub new: Vec<&'a ProductListing>,
    pub returned: Vec<(&'a ProductListing, &'a StoredProduct)>,
    pub still_available: Vec<(&'a ProductListing, &'a StoredProduct)>,
}

impl<'a> Classification<'a> {
    pub fn len(&self) -> usize {
        self.new.len() + self.returned.len() + self.still_available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored rows observed in the snapshot, whatever their state
    pub fn observed(&self) -> impl Iterator<Item = &(&'a ProductListing, &'a StoredProduct)> {
        self.returned.iter().chain(self.still_available.iter())
    }
}

/// Assign every snapshot listing to exactly one class
pub fn classify<'a>(snapshot: &'a [ProductListing], stored: &'a [StoredProduct]) -> Classification<'a> {
    let by_id: HashMap<ExternalId, &StoredProduct> = stored.iter().map(|p| (p.external_id, p)).collect();
    let mut classification = Classification::default();

    for listing in snapshot {
        let stored = by_id.get(&listing.external_id).copied();
        match (ProductState::of(stored), stored) {
            (ProductState::SoldOut, Some(stored)) => classification.returned.push((listing, stored)),
            (ProductState::Available, Some(stored)) => classification.still_available.push((listing, stored)),
            _ => classification.new.push(listing),
        }
    }

    classification
}

/// What one reconciliation pass changed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Listings this pass actually inserted
    pub new_products: Vec<ProductListing>,
    /// Listings this pass actually moved from sold out to available
    pub returned_products: Vec<ProductListing>,
    pub still_available: usize,
    pub aged_out: Vec<ExternalId>,
    pub price_changes: usize,
    pub observed_at: DateTime<Utc>,
}

impl ReconciliationReport {
    fn empty(observed_at: DateTime<Utc>) -> Self {
        Self {
            new_products: Vec::new(),
            returned_products: Vec::new(),
            still_available: 0,
            aged_out: Vec::new(),
            price_changes: 0,
            observed_at,
        }
    }
}

/// Storage failure part way through a pass, with what was already committed
#[derive(Error, Debug)]
#[error("Reconciliation aborted: {source}")]
pub struct ReconciliationFailure {
    pub committed: Box<ReconciliationReport>,
    #[source]
    pub source: StorageError,
}

pub struct ReconciliationEngine {
    repository: Arc<dyn ProductRepository>,
    staleness_threshold: Duration,
}

impl ReconciliationEngine {
    pub fn new(repository: Arc<dyn ProductRepository>, staleness_threshold: Duration) -> Self {
        Self {
            repository,
            staleness_threshold,
        }
    }

    pub async fn reconcile(&self, snapshot: &CatalogSnapshot) -> Result<ReconciliationReport, ReconciliationFailure> {
        self.reconcile_at(snapshot, Utc::now()).await
    }

    /// Reconcile with an explicit observation time.
    ///
    /// On a storage failure the error carries the transitions that were
    /// already committed, so the caller can still announce them.
    pub async fn reconcile_at(
        &self,
        snapshot: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport, ReconciliationFailure> {
        // Stored precision is milliseconds
        let now = DateTime::<Utc>::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let mut report = ReconciliationReport::empty(now);

        match self.apply(snapshot, now, &mut report).await {
            Ok(()) => {
                info!(
                    "🔄 Reconciled: {} new, {} returned, {} still available, {} sold out, {} price changes",
                    report.new_products.len(),
                    report.returned_products.len(),
                    report.still_available,
                    report.aged_out.len(),
                    report.price_changes
                );
                Ok(report)
            }
            Err(source) => Err(ReconciliationFailure {
                committed: Box::new(report),
                source,
            }),
        }
    }

    async fn apply(
        &self,
        snapshot: &CatalogSnapshot,
        now: DateTime<Utc>,
        report: &mut ReconciliationReport,
    ) -> StorageResult<()> {
        let snapshot_ids: Vec<ExternalId> = snapshot.products.iter().map(|p| p.external_id).collect();
        let stored = self.repository.find_by_ids(&snapshot_ids).await?;
        let classification = classify(&snapshot.products, &stored);

        debug!(
            "Classified {} listings: {} new, {} returned, {} still available",
            classification.len(),
            classification.new.len(),
            classification.returned.len(),
            classification.still_available.len()
        );

        // Returned: conditional on the row still being sold out
        for (listing, _) in &classification.returned {
            let filter = ProductFilter::by_ids(vec![listing.external_id]).with_sold_out(true);
            let affected = self
                .repository
                .update_many_by_filter(&filter, &ProductUpdate::returned(now))
                .await?;
            if affected == 1 {
                report.returned_products.push((*listing).clone());
            } else {
                debug!("Product {} already returned by another pass", listing.external_id);
            }
        }
        report.still_available = classification.still_available.len();

        // Heartbeat every observed stored row before the aging sweep
        let observed_ids: Vec<ExternalId> = classification.observed().map(|(l, _)| l.external_id).collect();
        if !observed_ids.is_empty() {
            self.repository
                .update_many_by_filter(&ProductFilter::by_ids(observed_ids), &ProductUpdate::heartbeat(now))
                .await?;
        }

        for (listing, stored) in classification.observed() {
            if listing.price != stored.price {
                info!(
                    "💱 Price of {} changed: {} -> {} UAH",
                    listing.external_id, stored.price, listing.price
                );
                self.repository
                    .update_fields(stored.storage_key, &ProductUpdate::price(listing.price))
                    .await?;
                report.price_changes += 1;
            }
        }

        self.age_out(&snapshot_ids, now, &mut report.aged_out).await?;

        if !classification.new.is_empty() {
            let records: Vec<ProductRecord> = classification
                .new
                .iter()
                .map(|listing| ProductRecord::first_seen((*listing).clone(), now))
                .collect();
            let inserted: HashSet<ExternalId> = self.repository.insert_many(&records).await?.into_iter().collect();

            report.new_products = records
                .into_iter()
                .map(|record| record.listing)
                .filter(|listing| inserted.contains(&listing.external_id))
                .collect();
        }

        Ok(())
    }

    /// Flip available rows unseen for longer than the threshold to sold out.
    /// Members of the current snapshot are never flipped.
    async fn age_out(
        &self,
        snapshot_ids: &[ExternalId],
        now: DateTime<Utc>,
        aged_out: &mut Vec<ExternalId>,
    ) -> StorageResult<()> {
        let Some(cutoff) = now.checked_sub_signed(self.staleness_threshold) else {
            debug!("Staleness threshold reaches past the earliest time; nothing can be stale");
            return Ok(());
        };
        let current: HashSet<ExternalId> = snapshot_ids.iter().copied().collect();
        let stale = self.repository.find_stale(cutoff, false).await?;

        for product in stale.iter().filter(|p| !current.contains(&p.external_id)) {
            if self
                .repository
                .update_fields(product.storage_key, &ProductUpdate::sold_out())
                .await?
            {
                debug!("Product {} marked sold out (last seen {})", product.external_id, product.updated_at);
                aged_out.push(product.external_id);
            }
        }
        Ok(())
    }
}
