use sqlx::PgPool;
use thiserror::Error;

/// Executes the `kanau` query objects in [`crate::entities`].
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Errors of the key-value stores backing checkpoints and the block-time cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store could not be reached for another reason
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
