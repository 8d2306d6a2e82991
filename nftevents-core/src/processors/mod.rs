//! Chain watchers.
//!
//! Each watcher owns one receive task and one processing task joined by a
//! bounded channel:
//!
//! - `EthereumWatcher`: log subscription, emits `Log`, pushes transfers
//! - `TezosWatcher`: REST catch-up and SignalR hub, emits `CanonicalEvent`
//! - `BitmarkWatcher`: Postgres LISTEN, emits `LedgerNotification`

pub mod bitmark_watcher;
pub mod ethereum_watcher;
pub mod tezos_watcher;

use thiserror::Error;

use crate::sources::signalr::SignalrError;

pub use bitmark_watcher::BitmarkWatcher;
pub use ethereum_watcher::{EthereumLogHandler, EthereumWatcher};
pub use tezos_watcher::TezosWatcher;

/// Fatal watcher failures. The process exits and is restarted externally.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// Tezos hub connection, subscription or stream failed
    #[error("tezos hub error: {0}")]
    Hub(#[from] SignalrError),

    /// Ledger LISTEN connection failed
    #[error("ledger listener error: {0}")]
    Listener(#[from] sqlx::Error),
}
