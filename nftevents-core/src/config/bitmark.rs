//! Bitmark watcher configuration.

use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct BitmarkConfig {
    /// Connection string of the ledger database.
    pub database_url: String,
    /// LISTEN channel announcing new transfers.
    pub listen_channel: String,
    /// Bitmark REST API root.
    pub api_url: Url,
    /// Timeout of a single API request.
    pub request_timeout: Duration,
}
