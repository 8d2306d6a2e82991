use async_trait::async_trait;
use kanau::processor::Processor;

use crate::checkpoint::CheckpointStore;
use crate::framework::{DatabaseProcessor, StoreError};

#[derive(Debug, Clone)]
/// Read one value from the `parameters` table.
pub struct GetParameter {
    pub key: String,
}

impl Processor<GetParameter> for DatabaseProcessor {
    type Output = Option<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetParameter")]
    async fn process(&self, query: GetParameter) -> Result<Option<String>, sqlx::Error> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT value
            FROM parameters
            WHERE key = $1
            "#,
        )
        .bind(query.key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }
}

#[derive(Debug, Clone)]
/// Upsert one value into the `parameters` table.
pub struct PutParameter {
    pub key: String,
    pub value: String,
}

impl Processor<PutParameter> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PutParameter")]
    async fn process(&self, insert: PutParameter) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO parameters (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(insert.key)
        .bind(insert.value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Checkpoint store on the `parameters` table.
#[derive(Debug, Clone)]
pub struct PgCheckpointStore {
    db: DatabaseProcessor,
}

impl PgCheckpointStore {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .db
            .process(GetParameter {
                key: key.to_owned(),
            })
            .await?;
        Ok(value)
    }

    async fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db
            .process(PutParameter {
                key: key.to_owned(),
                value: value.to_owned(),
            })
            .await?;
        Ok(())
    }
}
