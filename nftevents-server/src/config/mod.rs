//! Configuration module for nftevents-server.
//!
//! Handles loading configuration from the TOML file and environment
//! variables, and turns it into the watchers' runtime configuration.

pub mod file;

use crate::config::file::{
    BitmarkConfig as FileBitmarkConfig, EthereumConfig as FileEthereumConfig, FileConfig,
    TezosConfig as FileTezosConfig,
};
use nftevents_core::config::{
    BitmarkConfig, EthereumConfig, ProcessorConfig, TezosConfig, WatcherConfig,
};
use nftevents_sdk::client::directory_url;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read, validate and convert the configuration file.
    pub fn load(&self) -> Result<WatcherConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        parse(&config_content)
    }
}

fn parse(content: &str) -> Result<WatcherConfig, ConfigError> {
    let file_config: FileConfig = toml::from_str(content)?;
    validate(&file_config)?;
    build_watcher_config(file_config)
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.ethereum.is_none() && config.tezos.is_none() && config.bitmark.is_none() {
        return Err(ConfigError::ValidationError(
            "at least one of [ethereum], [tezos] or [bitmark] must be configured".to_string(),
        ));
    }
    if let Some(ethereum) = &config.ethereum {
        if ethereum.ws_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ethereum.ws_url is empty".to_string(),
            ));
        }
        if ethereum.reconnect.initial_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "ethereum.reconnect.initial_delay must be positive".to_string(),
            ));
        }
    }
    if let Some(tezos) = &config.tezos {
        if tezos.checkpoint_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tezos.checkpoint_key is empty".to_string(),
            ));
        }
    }
    if let Some(bitmark) = &config.bitmark {
        if bitmark.listen_channel.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bitmark.listen_channel is empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn build_watcher_config(file_config: FileConfig) -> Result<WatcherConfig, ConfigError> {
    Ok(WatcherConfig {
        processor: ProcessorConfig {
            endpoint: file_config.processor.endpoint,
            request_timeout: Duration::from_secs(file_config.processor.request_timeout_secs),
        },
        ethereum: file_config.ethereum.map(convert_ethereum),
        tezos: file_config.tezos.map(convert_tezos).transpose()?,
        bitmark: file_config.bitmark.map(convert_bitmark),
    })
}

fn convert_ethereum(e: FileEthereumConfig) -> EthereumConfig {
    EthereumConfig {
        rpc_url: e.rpc_url.unwrap_or_else(|| e.ws_url.clone()),
        ws_url: e.ws_url,
        rpc_timeout: Duration::from_secs(e.rpc_timeout_secs),
        reconnect: e.reconnect,
    }
}

fn convert_tezos(t: FileTezosConfig) -> Result<TezosConfig, ConfigError> {
    let hub_url = match t.hub_url {
        Some(url) => url,
        None => directory_url(t.api_url.clone())
            .join("v1/ws")
            .map_err(|e| ConfigError::ValidationError(format!("tezos.api_url: {e}")))?,
    };
    Ok(TezosConfig {
        api_url: t.api_url,
        hub_url,
        checkpoint_key: t.checkpoint_key,
        connect_timeout: Duration::from_secs(t.connect_timeout_secs),
        request_timeout: Duration::from_secs(t.request_timeout_secs),
    })
}

fn convert_bitmark(b: FileBitmarkConfig) -> BitmarkConfig {
    BitmarkConfig {
        database_url: b.database_url,
        listen_channel: b.listen_channel,
        api_url: b.api_url,
        request_timeout: Duration::from_secs(b.request_timeout_secs),
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
