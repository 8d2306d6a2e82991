//! Ethereum watcher configuration.

use std::time::Duration;

use crate::utils::backoff::ReconnectPolicy;

#[derive(Debug, Clone)]
pub struct EthereumConfig {
    /// WebSocket endpoint used for the log subscription.
    pub ws_url: String,
    /// Endpoint used for block lookups. May be the same as `ws_url`.
    pub rpc_url: String,
    /// Timeout of a single block lookup.
    pub rpc_timeout: Duration,
    /// Delay schedule between resubscription attempts.
    pub reconnect: ReconnectPolicy,
}
