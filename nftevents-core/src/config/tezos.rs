//! Tezos watcher configuration.

use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct TezosConfig {
    /// TzKT REST root, e.g. `https://api.tzkt.io`.
    pub api_url: Url,
    /// TzKT event hub, e.g. `https://api.tzkt.io/v1/ws`.
    pub hub_url: Url,
    /// Checkpoint store key of the last stopped level.
    pub checkpoint_key: String,
    /// Timeout of negotiate, upgrade and handshake together.
    pub connect_timeout: Duration,
    /// Timeout of a single REST request.
    pub request_timeout: Duration,
}
