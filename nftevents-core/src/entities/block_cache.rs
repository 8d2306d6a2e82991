use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::types::Json;

use crate::block_time::CacheStore;
use crate::framework::{DatabaseProcessor, StoreError};

#[derive(Debug, Clone)]
/// Read a cached document by key.
pub struct GetBlockCache {
    pub key: String,
}

impl Processor<GetBlockCache> for DatabaseProcessor {
    type Output = Option<serde_json::Value>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBlockCache")]
    async fn process(&self, query: GetBlockCache) -> Result<Option<serde_json::Value>, sqlx::Error> {
        let data = sqlx::query_scalar::<_, Json<serde_json::Value>>(
            r#"
            SELECT data
            FROM block_caches
            WHERE key = $1
            "#,
        )
        .bind(query.key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(data.map(|Json(value)| value))
    }
}

#[derive(Debug, Clone)]
/// Insert or replace a cached document.
pub struct PutBlockCache {
    pub key: String,
    pub data: serde_json::Value,
}

impl Processor<PutBlockCache> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PutBlockCache")]
    async fn process(&self, insert: PutBlockCache) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO block_caches (key, data)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(insert.key)
        .bind(Json(insert.data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Block-time cache on the `block_caches` table.
#[derive(Debug, Clone)]
pub struct PgCacheStore {
    db: DatabaseProcessor,
}

impl PgCacheStore {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let value = self
            .db
            .process(GetBlockCache {
                key: key.to_owned(),
            })
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.db
            .process(PutBlockCache {
                key: key.to_owned(),
                data: value,
            })
            .await?;
        Ok(())
    }
}
