//! Ethereum transport: log subscription, transfer log decoding and block
//! lookups over an alloy provider.

use std::pin::Pin;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::TransportError;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use time::OffsetDateTime;

use crate::block_time::{BlockTimeError, BlockTimeSource, timestamp_to_time};

pub mod abi {
    alloy::sol! {
        /// ERC-721 transfer.
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);

        /// ERC-1155 single transfer.
        event TransferSingle(
            address indexed operator,
            address indexed from,
            address indexed to,
            uint256 id,
            uint256 value
        );
    }
}

/// Errors of the Ethereum transport.
#[derive(Debug, Error)]
pub enum EthereumError {
    /// RPC or WebSocket failure
    #[error("ethereum transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors decoding a transfer log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// `TransferSingle` data is shorter than one word
    #[error("TransferSingle data has {0} bytes, expected at least 32")]
    ShortData(usize),
}

/// Stream of subscribed logs. Ends when the subscription is lost.
pub type LogStream = Pin<Box<dyn Stream<Item = Log> + Send>>;

/// Something that can open a transfer log subscription.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn subscribe(&self) -> Result<LogStream, EthereumError>;
}

/// Log filter matching ERC-721 `Transfer` and ERC-1155 `TransferSingle`.
///
/// ERC-20 `Transfer` shares the first signature and is filtered out later by
/// its topic count.
pub fn transfer_filter() -> Filter {
    Filter::new().event_signature(vec![
        abi::Transfer::SIGNATURE_HASH,
        abi::TransferSingle::SIGNATURE_HASH,
    ])
}

/// Subscribes over a fresh WebSocket connection on every call.
#[derive(Debug, Clone)]
pub struct WsLogSource {
    url: String,
}

impl WsLogSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl LogSource for WsLogSource {
    async fn subscribe(&self) -> Result<LogStream, EthereumError> {
        let provider = DynProvider::<Ethereum>::new(
            ProviderBuilder::new()
                .connect_ws(WsConnect::new(self.url.as_str()))
                .await?,
        );
        let subscription = provider.subscribe_logs(&transfer_filter()).await?;
        let logs = Box::pin(subscription.into_stream());
        // The provider owns the socket, so it travels with the stream.
        let stream = futures_util::stream::unfold((provider, logs), |(provider, mut logs)| async move {
            logs.next().await.map(|log| (log, (provider, logs)))
        });
        Ok(Box::pin(stream))
    }
}

/// Token standard of a decoded transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Erc721,
    Erc1155,
}

/// A transfer decoded from a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLog {
    pub kind: TransferKind,
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
}

impl TransferLog {
    pub fn token_id_decimal(&self) -> String {
        self.token_id.to_string()
    }
}

/// Decode an NFT transfer log.
///
/// Only logs with exactly four topics are NFT transfers; anything else
/// (including ERC-20 `Transfer`, which has three) yields `Ok(None)`.
pub fn decode_transfer_log(log: &Log) -> Result<Option<TransferLog>, DecodeError> {
    let topics = log.topics();
    if topics.len() != 4 {
        return Ok(None);
    }
    let contract = log.address();
    if topics[0] == abi::Transfer::SIGNATURE_HASH {
        return Ok(Some(TransferLog {
            kind: TransferKind::Erc721,
            contract,
            from: Address::from_word(topics[1]),
            to: Address::from_word(topics[2]),
            token_id: U256::from_be_bytes(topics[3].0),
        }));
    }
    if topics[0] == abi::TransferSingle::SIGNATURE_HASH {
        let data = &log.data().data;
        if data.len() < 32 {
            return Err(DecodeError::ShortData(data.len()));
        }
        return Ok(Some(TransferLog {
            kind: TransferKind::Erc1155,
            contract,
            from: Address::from_word(topics[2]),
            to: Address::from_word(topics[3]),
            token_id: U256::from_be_slice(&data[..32]),
        }));
    }
    Ok(None)
}

/// Block lookups through an alloy provider.
#[derive(Clone)]
pub struct RpcBlockTimeSource {
    provider: DynProvider<Ethereum>,
    timeout: Duration,
}

impl RpcBlockTimeSource {
    pub fn new(provider: DynProvider<Ethereum>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Connect to `url` (http, https, ws or wss).
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, EthereumError> {
        let provider = ProviderBuilder::new().connect(url).await?;
        Ok(Self::new(DynProvider::new(provider), timeout))
    }
}

#[async_trait]
impl BlockTimeSource for RpcBlockTimeSource {
    async fn block_time(&self, block_hash: B256) -> Result<OffsetDateTime, BlockTimeError> {
        let block = tokio::time::timeout(self.timeout, self.provider.get_block_by_hash(block_hash))
            .await
            .map_err(|_| BlockTimeError::Timeout)?
            .map_err(|e| BlockTimeError::Rpc(e.to_string()))?
            .ok_or(BlockTimeError::NotFound(block_hash))?;
        timestamp_to_time(block.header.timestamp)
    }
}
