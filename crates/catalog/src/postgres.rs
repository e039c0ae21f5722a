//! PostgreSQL-backed catalog store.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::records::{CatalogRecord, ProductDefinition};
use crate::store::{CatalogError, CatalogResult, CatalogStore};

/// Database connection pool plus schema management.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Connect to the catalog database from a URL.
    pub async fn connect(database_url: &str) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| CatalogError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> CatalogResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        CatalogError::DatabaseError(format!("Migration failed: {}", e))
                    })?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn find_product(&self, name: &str) -> CatalogResult<Option<ProductDefinition>> {
        let row = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT definition FROM products WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::DatabaseError(format!("Query failed: {}", e)))?;

        match row {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    async fn add_product(&self, definition: &ProductDefinition) -> CatalogResult<()> {
        let document = serde_json::to_value(definition)?;

        sqlx::query(
            "INSERT INTO products (name, definition) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(&definition.name)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::DatabaseError(format!("Insert failed: {}", e)))?;

        Ok(())
    }

    async fn dataset_digest(&self, identity: Uuid) -> CatalogResult<Option<Uuid>> {
        let digest =
            sqlx::query_scalar::<_, Uuid>("SELECT content_digest FROM datasets WHERE id = $1")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CatalogError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(digest)
    }

    async fn add_dataset(&self, record: &CatalogRecord) -> CatalogResult<bool> {
        let document = serde_json::to_value(record)?;

        // The primary key on id is what makes registration safe to
        // re-run; DO NOTHING keeps the first writer's row.
        let result = sqlx::query(
            r#"
            INSERT INTO datasets (
                id, product_name, uri, content_digest, crs,
                min_x, min_y, max_x, max_y,
                time_start, time_end, document
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9,
                $10, $11, $12
            )
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.identity())
        .bind(&record.product_name)
        .bind(&record.uri)
        .bind(record.content_digest())
        .bind(&record.crs)
        .bind(record.geometry.min_x)
        .bind(record.geometry.min_y)
        .bind(record.geometry.max_x)
        .bind(record.geometry.max_y)
        .bind(record.time.start())
        .bind(record.time.end())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::DatabaseError(format!("Insert failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    name TEXT PRIMARY KEY,
    definition JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS datasets (
    id UUID PRIMARY KEY,
    product_name TEXT NOT NULL REFERENCES products(name),
    uri TEXT NOT NULL,
    content_digest UUID NOT NULL,
    crs TEXT NOT NULL,
    min_x DOUBLE PRECISION NOT NULL,
    min_y DOUBLE PRECISION NOT NULL,
    max_x DOUBLE PRECISION NOT NULL,
    max_y DOUBLE PRECISION NOT NULL,
    time_start TIMESTAMPTZ NOT NULL,
    time_end TIMESTAMPTZ NOT NULL,
    document JSONB NOT NULL,
    registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_datasets_product ON datasets(product_name);
CREATE INDEX IF NOT EXISTS idx_datasets_time ON datasets(time_start, time_end)
"#;
