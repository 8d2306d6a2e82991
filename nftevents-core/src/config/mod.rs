//! Runtime configuration of the watchers.
//!
//! These types hold validated values and are built by the server crate from
//! its TOML file. A watcher runs only when its section is present.

mod bitmark;
mod ethereum;
mod processor;
mod tezos;

pub use bitmark::BitmarkConfig;
pub use ethereum::EthereumConfig;
pub use processor::ProcessorConfig;
pub use tezos::TezosConfig;

/// Everything needed to start the enabled watchers.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub processor: ProcessorConfig,
    pub ethereum: Option<EthereumConfig>,
    pub tezos: Option<TezosConfig>,
    pub bitmark: Option<BitmarkConfig>,
}

impl WatcherConfig {
    /// Names of the watchers that will run.
    pub fn enabled_watchers(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.ethereum.is_some() {
            enabled.push("ethereum");
        }
        if self.tezos.is_some() {
            enabled.push("tezos");
        }
        if self.bitmark.is_some() {
            enabled.push("bitmark");
        }
        enabled
    }
}
