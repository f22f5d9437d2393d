//! Repository interfaces for catalog product state
//!
//! The store is the only shared mutable resource of the monitor. Every
//! operation may fail with [`StorageError`], which aborts the current
//! reconciliation cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::product::{
    ExternalId, ProductFilter, ProductRecord, ProductUpdate, StorageKey, StoredProduct,
};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Corrupt row for product {external_id}: {reason}")]
    CorruptRow { external_id: i64, reason: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub const fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Stored products whose external id is in `ids`
    async fn find_by_ids(&self, ids: &[ExternalId]) -> StorageResult<Vec<StoredProduct>>;

    /// Products with `updated_at < older_than` and the given `sold_out` flag
    async fn find_stale(
        &self,
        older_than: DateTime<Utc>,
        sold_out: bool,
    ) -> StorageResult<Vec<StoredProduct>>;

    /// Insert records, ignoring ids that already exist. Returns the ids that
    /// were actually inserted.
    async fn insert_many(&self, records: &[ProductRecord]) -> StorageResult<Vec<ExternalId>>;

    /// Apply `update` to one row. Returns whether the row exists.
    async fn update_fields(&self, key: StorageKey, update: &ProductUpdate) -> StorageResult<bool>;

    /// Apply `update` to every row matching `filter`. Returns affected rows.
    async fn update_many_by_filter(
        &self,
        filter: &ProductFilter,
        update: &ProductUpdate,
    ) -> StorageResult<u64>;
}
