//! Postgres-backed document store
//!
//! All collections share one `documents` table with a JSONB body.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::{Document, DocumentStore, Query};
use crate::error::StoreError;

pub struct PostgresDocumentStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresDocumentStore {
    /// Build the pool without connecting; the first call opens connections.
    pub fn connect_lazy(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect_lazy(url)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS documents (
                      collection TEXT NOT NULL,
                      key TEXT NOT NULL,
                      body JSONB NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      PRIMARY KEY (collection, key)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await?;

        Ok(())
    }
}

const UPSERT: &str = r#"
    INSERT INTO documents (collection, key, body, updated_at)
    VALUES ($1, $2, $3, NOW())
    ON CONFLICT (collection, key)
    DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
"#;

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(body): Json<Document> = row.try_get("body")?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        sqlx::query(UPSERT)
            .bind(collection)
            .bind(key)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        let result = sqlx::query(
            r#"
            UPDATE documents SET body = body || $3, updated_at = NOW()
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(Json(&fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        Ok(())
    }

    async fn append_array(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        items: Vec<Value>,
        fields: Document,
    ) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        // One statement, so the row lock serialises concurrent appends.
        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, body, updated_at)
            VALUES ($1, $2, $5::jsonb || jsonb_build_object($3::text, $4::jsonb), NOW())
            ON CONFLICT (collection, key)
            DO UPDATE SET body = documents.body || $5::jsonb || jsonb_build_object(
                $3::text,
                COALESCE(
                    CASE WHEN jsonb_typeof(documents.body -> $3::text) = 'array'
                         THEN documents.body -> $3::text END,
                    '[]'::jsonb
                ) || $4::jsonb
            ),
            updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(field)
        .bind(Json(Value::Array(items)))
        .bind(Json(&fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.ensure_schema().await?;

        // LIMIT NULL means no limit.
        let limit = query.limit.map(|l| l as i64);

        let rows = match &query.field_in {
            Some((field, values)) => {
                sqlx::query(
                    r#"
                    SELECT body FROM documents
                    WHERE collection = $1 AND body ->> $2 = ANY($3)
                    ORDER BY key ASC
                    LIMIT $4
                    "#,
                )
                .bind(collection)
                .bind(field)
                .bind(values)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT body FROM documents
                    WHERE collection = $1
                    ORDER BY key ASC
                    LIMIT $2
                    "#,
                )
                .bind(collection)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter()
            .map(|row| -> Result<Document, StoreError> {
                let Json(body): Json<Document> = row.try_get("body")?;
                Ok(body)
            })
            .collect()
    }

    async fn batch_set(&self, collection: &str, docs: Vec<(String, Document)>) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;

        for (key, doc) in &docs {
            sqlx::query(UPSERT)
                .bind(collection)
                .bind(key)
                .bind(Json(doc))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
