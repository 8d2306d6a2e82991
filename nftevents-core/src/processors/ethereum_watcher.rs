//! EthereumWatcher processor.
//!
//! The EthereumWatcher is responsible for:
//! - Subscribing to ERC-721 `Transfer` and ERC-1155 `TransferSingle` logs
//! - Resubscribing after any connect failure or stream end, per the
//!   [`ReconnectPolicy`]
//! - Decoding each log, resolving its block time and pushing the event
//!
//! Receiving and processing run as two tasks joined by a bounded channel.

use std::sync::Arc;

use alloy::rpc::types::Log;
use futures_util::StreamExt;
use kanau::processor::Processor;
use nftevents_sdk::objects::{Blockchain, CanonicalEvent, TokenId, TokenTransfer};
use nftevents_sdk::objects::event::TokenIdError;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::block_time::{BlockTimeError, BlockTimeResolver};
use crate::emitter::{EmitError, SharedSink};
use crate::events::{EthereumLogReceiver, EthereumLogSender, ethereum_log_channel};
use crate::sources::ethereum::{DecodeError, LogSource, decode_transfer_log};
use crate::utils::backoff::ReconnectPolicy;

/// Errors that can occur while handling one log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Log looked like a transfer but could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Log has no block hash (pending log)
    #[error("log has no block hash")]
    MissingBlockHash,

    /// Log has no transaction hash
    #[error("log has no transaction hash")]
    MissingTransactionHash,

    /// Block time could not be resolved
    #[error("block time error: {0}")]
    BlockTime(#[from] BlockTimeError),

    /// Token id conversion failed
    #[error("token id error: {0}")]
    TokenId(#[from] TokenIdError),

    /// Push failed
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),
}

/// Turns subscribed logs into pushed canonical events.
#[derive(Clone)]
pub struct EthereumLogHandler {
    resolver: BlockTimeResolver,
    sink: SharedSink,
}

impl EthereumLogHandler {
    pub fn new(resolver: BlockTimeResolver, sink: SharedSink) -> Self {
        Self { resolver, sink }
    }

    async fn drain(self, mut log_rx: EthereumLogReceiver) {
        while let Some(log) = log_rx.recv().await {
            let tx_hash = log.transaction_hash;
            match self.process(log).await {
                Ok(Some(event)) => debug!(
                    tx_id = event.tx_id(),
                    event_type = %event.event_type(),
                    "Processed Ethereum transfer"
                ),
                Ok(None) => {}
                Err(e) => warn!(tx_hash = ?tx_hash, error = %e, "Skipping Ethereum log"),
            }
        }
        info!("Ethereum log channel closed");
    }
}

impl Processor<Log> for EthereumLogHandler {
    type Output = Option<CanonicalEvent>;
    type Error = LogError;

    async fn process(&self, log: Log) -> Result<Option<CanonicalEvent>, LogError> {
        let Some(transfer) = decode_transfer_log(&log)? else {
            return Ok(None);
        };
        let block_hash = log.block_hash.ok_or(LogError::MissingBlockHash)?;
        let tx_hash = log
            .transaction_hash
            .ok_or(LogError::MissingTransactionHash)?;
        let tx_time = self.resolver.get_block_time(block_hash).await?;
        debug!(kind = ?transfer.kind, block_hash = %block_hash, "Decoded NFT transfer");

        let event = CanonicalEvent::transfer(
            Blockchain::Ethereum,
            TokenTransfer {
                from: Some(transfer.from.to_checksum(None)),
                to: transfer.to.to_checksum(None),
                contract_address: transfer.contract.to_checksum(None),
                token_id: TokenId::from_decimal(&transfer.token_id_decimal())?,
                tx_id: alloy::hex::encode_prefixed(tx_hash),
                event_index: log.log_index.unwrap_or_default(),
                tx_time,
                level: None,
            },
        );
        self.sink.push(&event).await?;
        Ok(Some(event))
    }
}

/// Watches Ethereum transfer logs until shutdown.
pub struct EthereumWatcher {
    source: Arc<dyn LogSource>,
    handler: EthereumLogHandler,
    policy: ReconnectPolicy,
}

impl EthereumWatcher {
    pub fn new(source: Arc<dyn LogSource>, handler: EthereumLogHandler, policy: ReconnectPolicy) -> Self {
        Self {
            source,
            handler,
            policy,
        }
    }

    /// Run until the shutdown signal fires. Transport failures are retried
    /// forever, so this never fails.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        info!("EthereumWatcher started");

        let (log_tx, log_rx) = ethereum_log_channel();
        let consumer = tokio::spawn(self.handler.clone().drain(log_rx));

        Self::receive(self.source, self.policy, log_tx, shutdown_rx).await;

        // The sender is gone; the consumer drains what is buffered and stops.
        if let Err(e) = consumer.await {
            error!(error = %e, "Ethereum log consumer failed");
        }
        info!("EthereumWatcher shutdown complete");
    }

    async fn receive(
        source: Arc<dyn LogSource>,
        policy: ReconnectPolicy,
        log_tx: EthereumLogSender,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            let subscribed = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("EthereumWatcher received shutdown signal");
                        return;
                    }
                    continue;
                }

                subscribed = source.subscribe() => subscribed,
            };

            match subscribed {
                Ok(mut logs) => {
                    info!("Subscribed to Ethereum transfer logs");
                    attempt = 0;
                    loop {
                        tokio::select! {
                            biased;

                            changed = shutdown_rx.changed() => {
                                if changed.is_err() || *shutdown_rx.borrow() {
                                    info!("EthereumWatcher received shutdown signal");
                                    return;
                                }
                            }

                            next = logs.next() => match next {
                                Some(log) => {
                                    if log_tx.send(log).await.is_err() {
                                        warn!("Ethereum log consumer is gone");
                                        return;
                                    }
                                }
                                None => {
                                    warn!("Ethereum log subscription ended");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => error!(error = %e, attempt, "Failed to subscribe to Ethereum logs"),
            }

            let delay = policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            debug!(delay_ms = delay.as_millis() as u64, "Resubscribing after delay");
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("EthereumWatcher received shutdown signal");
                        return;
                    }
                }

                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
