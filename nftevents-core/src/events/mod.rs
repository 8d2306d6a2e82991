//! Watcher-local event plumbing.
//!
//! # Event Flow
//!
//! 1. Ethereum: log subscription -> `Log` channel -> decode -> `EventSink`
//! 2. Tezos: catch-up pages and hub batches -> `CanonicalEvent` channel -> `EventSink`
//! 3. Bitmark: LISTEN/NOTIFY -> `LedgerNotification` channel -> lookup -> `EventSink`
//!
//! Every channel has exactly one consumer, so events of one watcher are pushed
//! in the order they were enqueued.

pub mod channels;
pub mod types;

pub use channels::{
    CanonicalEventReceiver, CanonicalEventSender, EVENT_CHANNEL_CAPACITY, EthereumLogReceiver,
    EthereumLogSender, LedgerNotificationReceiver, LedgerNotificationSender,
    canonical_event_channel, ethereum_log_channel, ledger_notification_channel,
};
pub use types::LedgerNotification;
