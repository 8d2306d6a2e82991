//! Live TzKT events over the SignalR hub.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::signalr::{HubConnection, SignalrError};
use super::tzkt::{
    BigMapUpdateRecord, MESSAGE_DATA, MESSAGE_REORG, TOKEN_METADATA_TAG, TokenTransferRecord,
    TzktMessage,
};

/// Hub channel carrying token transfers.
pub const TRANSFERS_CHANNEL: &str = "transfers";
/// Hub channel carrying big-map updates.
pub const BIGMAPS_CHANNEL: &str = "bigmaps";

/// One decoded hub push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveBatch {
    Transfers(Vec<TokenTransferRecord>),
    MetadataUpdates(Vec<BigMapUpdateRecord>),
    /// State messages, reorg notices, empty batches and unknown channels.
    Ignored,
}

/// Live Tezos event source.
#[async_trait]
pub trait TezosEventFeed: Send {
    /// Subscribe to token transfers and token-metadata big-map updates.
    async fn subscribe(&mut self) -> Result<(), SignalrError>;

    /// Wait for the next pushed batch. An error means the feed is gone.
    async fn next_batch(&mut self) -> Result<LiveBatch, SignalrError>;
}

/// The TzKT event hub.
pub struct TzktEventHub {
    connection: HubConnection,
}

impl TzktEventHub {
    pub async fn connect(hub_url: &Url, http: &Client, timeout: Duration) -> Result<Self, SignalrError> {
        let connection = HubConnection::connect(hub_url, http, timeout).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl TezosEventFeed for TzktEventHub {
    async fn subscribe(&mut self) -> Result<(), SignalrError> {
        self.connection
            .invoke("SubscribeToTokenTransfers", vec![json!({})])
            .await?;
        self.connection
            .invoke(
                "SubscribeToBigMaps",
                vec![json!({ "tags": [TOKEN_METADATA_TAG] })],
            )
            .await?;
        Ok(())
    }

    async fn next_batch(&mut self) -> Result<LiveBatch, SignalrError> {
        let (target, arguments) = self.connection.next_invocation().await?;
        Ok(decode_batch(&target, arguments))
    }
}

/// Decode the arguments of a hub invocation into a batch.
pub fn decode_batch(target: &str, mut arguments: Vec<Value>) -> LiveBatch {
    if arguments.is_empty() {
        return LiveBatch::Ignored;
    }
    let payload = arguments.swap_remove(0);
    match target {
        TRANSFERS_CHANNEL => decode_data::<TokenTransferRecord>(target, payload)
            .map(LiveBatch::Transfers)
            .unwrap_or(LiveBatch::Ignored),
        BIGMAPS_CHANNEL => decode_data::<BigMapUpdateRecord>(target, payload)
            .map(LiveBatch::MetadataUpdates)
            .unwrap_or(LiveBatch::Ignored),
        other => {
            debug!(channel = other, "Ignoring unknown hub channel");
            LiveBatch::Ignored
        }
    }
}

fn decode_data<T: DeserializeOwned>(channel: &str, payload: Value) -> Option<Vec<T>> {
    let message: TzktMessage<T> = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(channel, error = %e, "Malformed hub message");
            return None;
        }
    };
    match message.kind {
        MESSAGE_DATA if !message.data.is_empty() => Some(message.data),
        MESSAGE_DATA => None,
        MESSAGE_REORG => {
            warn!(channel, state = message.state, "Chain reorganization reported");
            None
        }
        _ => {
            debug!(channel, state = message.state, "Subscription state");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_transfer_batch() {
        let batch = decode_batch(
            TRANSFERS_CHANNEL,
            vec![json!({
                "type": 1,
                "state": 3400001,
                "data": [{
                    "id": 1,
                    "level": 3400001,
                    "timestamp": "2023-05-01T12:00:00Z",
                    "token": {"contract": {"address": "KT1RJ6PbjHpwc3M5rw5s2Nbmefwbuwbdxton"}, "tokenId": "1"},
                    "to": {"address": "tz1aSkwEot3L2kmUvcoxzjMomb9mvBNuzFK6"},
                    "originationId": 5
                }]
            })],
        );
        assert!(matches!(batch, LiveBatch::Transfers(ref records) if records.len() == 1));
    }

    #[test]
    fn empty_state_and_reorg_messages_are_ignored() {
        assert_eq!(
            decode_batch(TRANSFERS_CHANNEL, vec![json!({"type": 0, "state": 10})]),
            LiveBatch::Ignored
        );
        assert_eq!(
            decode_batch(BIGMAPS_CHANNEL, vec![json!({"type": 1, "state": 10, "data": []})]),
            LiveBatch::Ignored
        );
        assert_eq!(
            decode_batch(BIGMAPS_CHANNEL, vec![json!({"type": 2, "state": 9})]),
            LiveBatch::Ignored
        );
        assert_eq!(decode_batch("operations", vec![json!({})]), LiveBatch::Ignored);
        assert_eq!(decode_batch(TRANSFERS_CHANNEL, vec![]), LiveBatch::Ignored);
    }
}
