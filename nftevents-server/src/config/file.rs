//! TOML file configuration structures.
//!
//! These structs directly map to the `nftevents-config.toml` file format.
//! Durations are whole seconds unless the key says otherwise.

use nftevents_core::utils::backoff::ReconnectPolicy;
use serde::Deserialize;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub ethereum: Option<EthereumConfig>,
    #[serde(default)]
    pub tezos: Option<TezosConfig>,
    #[serde(default)]
    pub bitmark: Option<BitmarkConfig>,
}

/// Downstream event processor.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Root URL of the event processor (e.g., "http://processor:8087").
    pub endpoint: Url,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Ethereum section. Present means the Ethereum watcher runs.
#[derive(Debug, Clone, Deserialize)]
pub struct EthereumConfig {
    /// WebSocket RPC endpoint for the log subscription.
    pub ws_url: String,
    /// RPC endpoint for block lookups. Defaults to `ws_url`.
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub rpc_timeout_secs: u64,
    /// Resubscription delays in milliseconds.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

/// Tezos section. Present means the Tezos watcher runs.
#[derive(Debug, Clone, Deserialize)]
pub struct TezosConfig {
    /// TzKT REST root (e.g., "https://api.tzkt.io").
    pub api_url: Url,
    /// TzKT event hub. Defaults to `{api_url}/v1/ws`.
    #[serde(default)]
    pub hub_url: Option<Url>,
    #[serde(default = "default_checkpoint_key")]
    pub checkpoint_key: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Bitmark section. Present means the Bitmark watcher runs.
#[derive(Debug, Clone, Deserialize)]
pub struct BitmarkConfig {
    /// Connection string of the ledger database.
    pub database_url: String,
    #[serde(default = "default_listen_channel")]
    pub listen_channel: String,
    /// Bitmark REST API root (e.g., "https://api.bitmark.com").
    pub api_url: Url,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_checkpoint_key() -> String {
    "tezos_last_stopped_level".to_string()
}

fn default_listen_channel() -> String {
    "new_transfers".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[processor]
endpoint = "http://processor:8087"

[ethereum]
ws_url = "wss://mainnet.example.com/ws"

[ethereum.reconnect]
initial_delay = 500
max_delay = 30000
multiplier = 2

[tezos]
api_url = "https://api.tzkt.io"

[bitmark]
database_url = "postgres://ledger@localhost/bitmark"
api_url = "https://api.bitmark.com"
request_timeout_secs = 5
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.processor.request_timeout_secs, 10);

        let ethereum = config.ethereum.unwrap();
        assert!(ethereum.rpc_url.is_none());
        assert_eq!(ethereum.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(ethereum.reconnect.delay(10), Duration::from_secs(30));

        let tezos = config.tezos.unwrap();
        assert_eq!(tezos.checkpoint_key, "tezos_last_stopped_level");
        assert_eq!(tezos.connect_timeout_secs, 10);

        let bitmark = config.bitmark.unwrap();
        assert_eq!(bitmark.listen_channel, "new_transfers");
        assert_eq!(bitmark.request_timeout_secs, 5);
    }

    #[test]
    fn test_missing_sections_disable_watchers() {
        let config: FileConfig = toml::from_str(
            r#"
[processor]
endpoint = "http://processor:8087"

[tezos]
api_url = "https://api.tzkt.io"
hub_url = "https://events.example.com/v1/ws"
"#,
        )
        .unwrap();
        assert!(config.ethereum.is_none());
        assert!(config.bitmark.is_none());
        assert_eq!(
            config.tezos.unwrap().hub_url.unwrap().as_str(),
            "https://events.example.com/v1/ws"
        );
    }

    #[test]
    fn test_default_reconnect_policy() {
        let config: FileConfig = toml::from_str(
            r#"
[processor]
endpoint = "http://processor:8087"

[ethereum]
ws_url = "wss://mainnet.example.com/ws"
"#,
        )
        .unwrap();
        let reconnect = config.ethereum.unwrap().reconnect;
        assert_eq!(reconnect, ReconnectPolicy::default());
        assert_eq!(reconnect.delay(5), Duration::from_secs(1));
    }
}
