pub mod block_cache;
pub mod ledger_event;
pub mod parameter;

pub use block_cache::PgCacheStore;
pub use parameter::PgCheckpointStore;
