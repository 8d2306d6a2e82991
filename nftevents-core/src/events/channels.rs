//! Event channel factories and handles.
//!
//! Each watcher owns one bounded channel between its network-receive task and
//! its single processing task. Producers wait when the buffer is full, so
//! nothing is dropped on the way.

use super::types::LedgerNotification;
use alloy::rpc::types::Log;
use nftevents_sdk::objects::CanonicalEvent;
use tokio::sync::mpsc;

/// Buffer size of every watcher-local channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Sender handle for raw Ethereum logs.
pub type EthereumLogSender = mpsc::Sender<Log>;
/// Receiver handle for raw Ethereum logs.
pub type EthereumLogReceiver = mpsc::Receiver<Log>;

/// Sender handle for decoded canonical events.
pub type CanonicalEventSender = mpsc::Sender<CanonicalEvent>;
/// Receiver handle for decoded canonical events.
pub type CanonicalEventReceiver = mpsc::Receiver<CanonicalEvent>;

/// Sender handle for ledger notifications.
pub type LedgerNotificationSender = mpsc::Sender<LedgerNotification>;
/// Receiver handle for ledger notifications.
pub type LedgerNotificationReceiver = mpsc::Receiver<LedgerNotification>;

/// Create the channel carrying subscribed Ethereum logs.
pub fn ethereum_log_channel() -> (EthereumLogSender, EthereumLogReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Create the channel carrying canonical events (Tezos catch-up and live).
pub fn canonical_event_channel() -> (CanonicalEventSender, CanonicalEventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Create the channel carrying ledger LISTEN/NOTIFY payloads.
pub fn ledger_notification_channel() -> (LedgerNotificationSender, LedgerNotificationReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
