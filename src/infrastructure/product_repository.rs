//! SQLite implementation of the product store
//!
//! Timestamps are stored as Unix milliseconds. `external_id` carries a
//! UNIQUE constraint, so inserts are idempotent under repeated or
//! overlapping cycles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};
use tracing::debug;

use crate::domain::product::{
    Circulation, ExternalId, ProductFilter, ProductListing, ProductRecord, ProductUpdate, StorageKey,
    StoredProduct,
};
use crate::domain::repositories::{ProductRepository, StorageError, StorageResult};

/// Bound parameters per `IN (...)` list, well below SQLite's variable limit
const ID_CHUNK_SIZE: usize = 500;

const STORED_COLUMNS: &str = "id, external_id, name, price, detail_url, sold_out, available_from, updated_at";

pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Full record for one external id
    pub async fn find_record(&self, external_id: ExternalId) -> StorageResult<Option<ProductRecord>> {
        let row = sqlx::query(
            r"
            SELECT external_id, name, price, detail_url, image_url, material, circulation,
                   year_of_production, sold_out, created_at, available_from, updated_at
            FROM products WHERE external_id = ?
            ",
        )
        .bind(external_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database("find record", e))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    pub async fn count(&self) -> StorageResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::database("count products", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Helper method to convert a database row to the reconciliation projection
    fn row_to_stored(row: &SqliteRow) -> StorageResult<StoredProduct> {
        let external_id: i64 = get(row, "external_id")?;
        Ok(StoredProduct {
            storage_key: get(row, "id")?,
            external_id: ExternalId(external_id),
            name: get(row, "name")?,
            price: price_from_db(external_id, get(row, "price")?)?,
            detail_url: get(row, "detail_url")?,
            sold_out: get(row, "sold_out")?,
            available_from: from_millis(external_id, get(row, "available_from")?)?,
            updated_at: from_millis(external_id, get(row, "updated_at")?)?,
        })
    }

    fn row_to_record(row: &SqliteRow) -> StorageResult<ProductRecord> {
        let external_id: i64 = get(row, "external_id")?;
        let circulation: Option<String> = get(row, "circulation")?;
        let year: Option<i64> = get(row, "year_of_production")?;

        let listing = ProductListing {
            external_id: ExternalId(external_id),
            name: get(row, "name")?,
            price: price_from_db(external_id, get(row, "price")?)?,
            detail_url: get(row, "detail_url")?,
            image_url: get(row, "image_url")?,
            material: get(row, "material")?,
            circulation: circulation.as_deref().and_then(Circulation::parse),
            year_of_production: year.and_then(|y| i32::try_from(y).ok()),
        };

        Ok(ProductRecord {
            listing,
            sold_out: get(row, "sold_out")?,
            created_at: from_millis(external_id, get(row, "created_at")?)?,
            available_from: from_millis(external_id, get(row, "available_from")?)?,
            updated_at: from_millis(external_id, get(row, "updated_at")?)?,
        })
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn find_by_ids(&self, ids: &[ExternalId]) -> StorageResult<Vec<StoredProduct>> {
        let mut found = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {STORED_COLUMNS} FROM products WHERE "));
            push_id_list(&mut builder, chunk);

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::database("find by ids", e))?;

            for row in &rows {
                found.push(Self::row_to_stored(row)?);
            }
        }

        Ok(found)
    }

    async fn find_stale(&self, older_than: DateTime<Utc>, sold_out: bool) -> StorageResult<Vec<StoredProduct>> {
        let rows = sqlx::query(&format!(
            "SELECT {STORED_COLUMNS} FROM products WHERE updated_at < ? AND sold_out = ? ORDER BY updated_at"
        ))
        .bind(older_than.timestamp_millis())
        .bind(sold_out)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::database("find stale", e))?;

        rows.iter().map(Self::row_to_stored).collect()
    }

    async fn insert_many(&self, records: &[ProductRecord]) -> StorageResult<Vec<ExternalId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::database("begin insert", e))?;
        let mut inserted = Vec::with_capacity(records.len());

        for record in records {
            let listing = &record.listing;
            let result = sqlx::query(
                r"
                INSERT OR IGNORE INTO products (
                    external_id, name, price, detail_url, image_url, material, circulation,
                    year_of_production, sold_out, created_at, available_from, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(listing.external_id.value())
            .bind(&listing.name)
            .bind(price_to_db(listing.price))
            .bind(&listing.detail_url)
            .bind(&listing.image_url)
            .bind(&listing.material)
            .bind(listing.circulation.as_ref().map(Circulation::to_storage))
            .bind(listing.year_of_production)
            .bind(record.sold_out)
            .bind(record.created_at.timestamp_millis())
            .bind(record.available_from.timestamp_millis())
            .bind(record.updated_at.timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::database("insert product", e))?;

            if result.rows_affected() == 1 {
                inserted.push(listing.external_id);
            } else {
                debug!("Product {} already stored, insert ignored", listing.external_id);
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::database("commit insert", e))?;
        Ok(inserted)
    }

    async fn update_fields(&self, key: StorageKey, update: &ProductUpdate) -> StorageResult<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        push_assignments(&mut builder, update);
        builder.push(" WHERE id = ").push_bind(key);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::database("update product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_many_by_filter(&self, filter: &ProductFilter, update: &ProductUpdate) -> StorageResult<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let Some(ids) = &filter.external_ids else {
            return self.update_chunk(filter, None, update).await;
        };

        let mut affected = 0;
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            affected += self.update_chunk(filter, Some(chunk), update).await?;
        }
        Ok(affected)
    }
}

impl SqliteProductRepository {
    async fn update_chunk(
        &self,
        filter: &ProductFilter,
        ids: Option<&[ExternalId]>,
        update: &ProductUpdate,
    ) -> StorageResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        push_assignments(&mut builder, update);
        builder.push(" WHERE 1 = 1");

        if let Some(ids) = ids {
            builder.push(" AND ");
            push_id_list(&mut builder, ids);
        }
        if let Some(sold_out) = filter.sold_out {
            builder.push(" AND sold_out = ").push_bind(sold_out);
        }
        if let Some(before) = filter.updated_before {
            builder.push(" AND updated_at < ").push_bind(before.timestamp_millis());
        }

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::database("update by filter", e))?;
        Ok(result.rows_affected())
    }
}

/// `SET` clause; timestamps never move backwards
fn push_assignments(builder: &mut QueryBuilder<'_, Sqlite>, update: &ProductUpdate) {
    let mut set = builder.separated(", ");
    if let Some(updated_at) = update.updated_at {
        set.push("updated_at = MAX(updated_at, ");
        set.push_bind_unseparated(updated_at.timestamp_millis());
        set.push_unseparated(")");
    }
    if let Some(available_from) = update.available_from {
        set.push("available_from = MAX(available_from, ");
        set.push_bind_unseparated(available_from.timestamp_millis());
        set.push_unseparated(")");
    }
    if let Some(price) = update.price {
        set.push("price = ");
        set.push_bind_unseparated(price_to_db(price));
    }
    if let Some(sold_out) = update.sold_out {
        set.push("sold_out = ");
        set.push_bind_unseparated(sold_out);
    }
}

/// `external_id IN (...)`; an empty list matches nothing
fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[ExternalId]) {
    if ids.is_empty() {
        builder.push("0 = 1");
        return;
    }
    builder.push("external_id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(id.value());
    }
    list.push_unseparated(")");
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StorageError::database("decode row", e))
}

fn price_to_db(price: u64) -> i64 {
    i64::try_from(price).unwrap_or(i64::MAX)
}

fn price_from_db(external_id: i64, price: i64) -> StorageResult<u64> {
    u64::try_from(price).map_err(|_| StorageError::CorruptRow {
        external_id,
        reason: format!("negative price {price}"),
    })
}

fn from_millis(external_id: i64, millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| StorageError::CorruptRow {
        external_id,
        reason: format!("timestamp {millis} out of range"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn repository() -> (TempDir, SqliteProductRepository) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("products.db").display());
        let db = DatabaseConnection::new(&url).await.unwrap();
        db.migrate().await.unwrap();
        (dir, SqliteProductRepository::new(db.pool().clone()))
    }

    fn listing(id: i64, price: u64) -> ProductListing {
        ProductListing {
            external_id: ExternalId(id),
            name: format!("Coin {id}"),
            price,
            detail_url: format!("https://coins.bank.gov.ua/p-{id}.html"),
            image_url: format!("https://coins.bank.gov.ua/img/{id}.jpg"),
            material: Some("срібло".to_string()),
            circulation: Some(Circulation::Count(3000)),
            year_of_production: Some(2024),
        }
    }

    fn millis_now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_many_reports_only_new_ids() {
        let (_dir, repo) = repository().await;
        let now = millis_now();

        let first = vec![ProductRecord::first_seen(listing(1, 100), now)];
        assert_eq!(repo.insert_many(&first).await.unwrap(), vec![ExternalId(1)]);

        let second = vec![
            ProductRecord::first_seen(listing(1, 100), now),
            ProductRecord::first_seen(listing(2, 200), now),
        ];
        assert_eq!(repo.insert_many(&second).await.unwrap(), vec![ExternalId(2)]);
        assert_eq!(repo.count().await.unwrap(), 2);

        let stored = repo.find_record(ExternalId(1)).await.unwrap().unwrap();
        assert_eq!(stored.listing, listing(1, 100));
        assert_eq!(stored.created_at, now);
    }

    #[tokio::test]
    async fn test_find_by_ids_and_empty_lists() {
        let (_dir, repo) = repository().await;
        let now = millis_now();
        let records: Vec<_> = (1..=3).map(|id| ProductRecord::first_seen(listing(id, 10), now)).collect();
        repo.insert_many(&records).await.unwrap();

        let found = repo.find_by_ids(&[ExternalId(1), ExternalId(3), ExternalId(99)]).await.unwrap();
        let mut ids: Vec<i64> = found.iter().map(|p| p.external_id.value()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);

        assert!(repo.find_by_ids(&[]).await.unwrap().is_empty());
        let affected = repo
            .update_many_by_filter(&ProductFilter::by_ids(Vec::new()), &ProductUpdate::sold_out())
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_conditional_update_only_touches_matching_rows() {
        let (_dir, repo) = repository().await;
        let earlier = millis_now() - Duration::minutes(10);
        repo.insert_many(&[ProductRecord::first_seen(listing(5, 10), earlier)]).await.unwrap();

        let stored = repo.find_by_ids(&[ExternalId(5)]).await.unwrap().remove(0);
        assert!(repo.update_fields(stored.storage_key, &ProductUpdate::sold_out()).await.unwrap());

        let now = millis_now();
        let returned = ProductFilter::by_ids(vec![ExternalId(5)]).with_sold_out(true);
        assert_eq!(repo.update_many_by_filter(&returned, &ProductUpdate::returned(now)).await.unwrap(), 1);
        assert_eq!(repo.update_many_by_filter(&returned, &ProductUpdate::returned(now)).await.unwrap(), 0);

        let record = repo.find_record(ExternalId(5)).await.unwrap().unwrap();
        assert!(!record.sold_out);
        assert_eq!(record.available_from, now);
        assert_eq!(record.updated_at, now);
        assert_eq!(record.created_at, earlier);
    }

    #[tokio::test]
    async fn test_updated_at_never_moves_backwards() {
        let (_dir, repo) = repository().await;
        let now = millis_now();
        repo.insert_many(&[ProductRecord::first_seen(listing(8, 10), now)]).await.unwrap();

        let filter = ProductFilter::by_ids(vec![ExternalId(8)]);
        repo.update_many_by_filter(&filter, &ProductUpdate::heartbeat(now - Duration::hours(1)))
            .await
            .unwrap();

        let record = repo.find_record(ExternalId(8)).await.unwrap().unwrap();
        assert_eq!(record.updated_at, now);
    }

    #[tokio::test]
    async fn test_find_stale_respects_threshold_and_flag() {
        let (_dir, repo) = repository().await;
        let now = millis_now();
        repo.insert_many(&[
            ProductRecord::first_seen(listing(1, 10), now - Duration::minutes(10)),
            ProductRecord::first_seen(listing(2, 10), now - Duration::minutes(1)),
        ])
        .await
        .unwrap();

        let stale = repo.find_stale(now - Duration::minutes(5), false).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].external_id, ExternalId(1));
        assert!(repo.find_stale(now - Duration::minutes(5), true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_update_and_missing_row() {
        let (_dir, repo) = repository().await;
        repo.insert_many(&[ProductRecord::first_seen(listing(4, 10), millis_now())])
            .await
            .unwrap();
        let stored = repo.find_by_ids(&[ExternalId(4)]).await.unwrap().remove(0);

        assert!(repo.update_fields(stored.storage_key, &ProductUpdate::price(25)).await.unwrap());
        assert_eq!(repo.find_by_ids(&[ExternalId(4)]).await.unwrap()[0].price, 25);
        assert!(!repo.update_fields(9_999, &ProductUpdate::price(25)).await.unwrap());
    }
}
