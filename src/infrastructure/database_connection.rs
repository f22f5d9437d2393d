// Database connection and pool management
// This module handles SQLite database connections using sqlx

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use tracing::info;

use crate::domain::repositories::{StorageError, StorageResult};

const CREATE_PRODUCTS_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id INTEGER NOT NULL UNIQUE,
        name TEXT NOT NULL,
        price INTEGER NOT NULL,
        detail_url TEXT NOT NULL,
        image_url TEXT NOT NULL,
        material TEXT,
        circulation TEXT,
        year_of_production INTEGER,
        sold_out BOOLEAN NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        available_from INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
";

const CREATE_AGING_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_products_sold_out_updated_at ON products (sold_out, updated_at)";

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> StorageResult<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        // In-memory databases live only as long as their connection
        let in_memory = db_path.contains(":memory:") || db_path.contains("mode=memory");
        if !in_memory {
            ensure_database_file(db_path).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections })
            .connect(database_url)
            .await
            .map_err(|e| StorageError::database("connect", e))?;

        info!("🗄️ Database connected: {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::query(CREATE_PRODUCTS_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::database("create products table", e))?;
        sqlx::query(CREATE_AGING_INDEX_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::database("create aging index", e))?;

        Ok(())
    }
}

async fn ensure_database_file(db_path: &str) -> StorageResult<()> {
    let path = Path::new(db_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot create {}: {e}", parent.display())))?;
    }

    if !path.exists() {
        tokio::fs::File::create(path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot create {db_path}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await.unwrap();

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_database_migration_is_repeatable() {
        let temp_dir = tempdir().unwrap();
        let database_url = format!("sqlite:{}", temp_dir.path().join("migrate.db").display());

        let db = DatabaseConnection::new(&database_url).await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();

        let result = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='products'")
            .fetch_optional(db.pool())
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert!(!db.pool().is_closed());
    }
}
