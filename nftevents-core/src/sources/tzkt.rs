//! TzKT indexer REST client and record types.
//!
//! The same record shapes are delivered by the REST endpoints (catch-up) and
//! by the SignalR hub (live), so both paths convert through
//! [`TokenTransferRecord::into_event`] and [`BigMapUpdateRecord::into_event`].

use std::time::Duration;

use async_trait::async_trait;
use nftevents_sdk::client::directory_url;
use nftevents_sdk::objects::{
    Blockchain, CanonicalEvent, TokenId, TokenMetadataUpdate, TokenTransfer,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

/// Big-map tag of token metadata.
pub const TOKEN_METADATA_TAG: &str = "token_metadata";

/// Errors of the TzKT REST client and record conversion.
#[derive(Debug, Error)]
pub enum TzktError {
    /// Transport-level failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint URL could not be built
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A record is missing data required for a canonical event
    #[error("invalid record {id}: {reason}")]
    Record { id: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountRef {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub contract: AccountRef,
    pub token_id: String,
}

/// A token transfer as returned by `/v1/tokens/transfers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferRecord {
    pub id: u64,
    pub level: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub token: TokenRef,
    #[serde(default)]
    pub from: Option<AccountRef>,
    #[serde(default)]
    pub to: Option<AccountRef>,
    #[serde(default)]
    pub transaction_id: Option<u64>,
    #[serde(default)]
    pub origination_id: Option<u64>,
    #[serde(default)]
    pub migration_id: Option<u64>,
}

impl TokenTransferRecord {
    /// Operation id that produced this transfer.
    pub fn operation_id(&self) -> u64 {
        self.transaction_id
            .or(self.origination_id)
            .or(self.migration_id)
            .unwrap_or(self.id)
    }

    pub fn into_event(self) -> Result<CanonicalEvent, TzktError> {
        let token_id = TokenId::from_decimal(&self.token.token_id).map_err(|e| TzktError::Record {
            id: self.id,
            reason: e.to_string(),
        })?;
        let tx_id = self.operation_id().to_string();
        Ok(CanonicalEvent::transfer(
            Blockchain::Tezos,
            TokenTransfer {
                from: self.from.map(|account| account.address),
                to: self.to.map(|account| account.address).unwrap_or_default(),
                contract_address: self.token.contract.address,
                token_id,
                tx_id,
                event_index: 0,
                tx_time: self.timestamp,
                level: Some(self.level),
            },
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BigMapContent {
    #[serde(default)]
    pub key: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A big-map update as returned by `/v1/bigmaps/updates`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BigMapUpdateRecord {
    pub id: u64,
    pub level: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub contract: AccountRef,
    pub action: String,
    #[serde(default)]
    pub content: Option<BigMapContent>,
}

impl BigMapUpdateRecord {
    /// Actions that change existing token metadata.
    pub const METADATA_ACTIONS: [&'static str; 2] = ["update_key", "remove_key"];

    pub fn is_metadata_change(&self) -> bool {
        Self::METADATA_ACTIONS.contains(&self.action.as_str())
    }

    /// Convert a metadata change. Key creation and big-map allocation yield
    /// `Ok(None)`; the mint transfer already covers new tokens.
    pub fn into_event(self) -> Result<Option<CanonicalEvent>, TzktError> {
        if !self.is_metadata_change() {
            return Ok(None);
        }
        let raw = self
            .content
            .as_ref()
            .and_then(|content| {
                scalar_string(&content.value["token_id"]).or_else(|| scalar_string(&content.key))
            })
            .ok_or_else(|| TzktError::Record {
                id: self.id,
                reason: "no token id in big-map content".to_owned(),
            })?;
        let token_id = TokenId::from_decimal(&raw).map_err(|e| TzktError::Record {
            id: self.id,
            reason: e.to_string(),
        })?;
        Ok(Some(CanonicalEvent::token_updated(
            Blockchain::Tezos,
            TokenMetadataUpdate {
                contract_address: self.contract.address,
                token_id,
                tx_id: self.id.to_string(),
                tx_time: self.timestamp,
                level: Some(self.level),
            },
        )))
    }
}

fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tezos indexer queries used by catch-up.
#[async_trait]
pub trait TezosExplorer: Send + Sync {
    /// Level of the last block produced at or before `at`.
    async fn level_by_time(&self, at: OffsetDateTime) -> Result<u64, TzktError>;

    /// Token transfers at `level`, ordered by id.
    async fn token_transfers(
        &self,
        level: u64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TokenTransferRecord>, TzktError>;

    /// Token-metadata big-map changes at `level`, ordered by id.
    async fn token_metadata_updates(
        &self,
        level: u64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<BigMapUpdateRecord>, TzktError>;
}

/// Typed HTTP client for the TzKT REST API.
#[derive(Debug, Clone)]
pub struct TzktClient {
    http: Client,
    base_url: Url,
}

impl TzktClient {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: directory_url(base_url),
        }
    }

    /// `path` is relative to the base URL, which may carry a prefix.
    fn endpoint(&self, path: &str) -> Result<Url, TzktError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TzktError> {
        let url = self.endpoint(path)?;
        let resp = self.http.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TzktError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(TzktError::Json)
    }
}

#[async_trait]
impl TezosExplorer for TzktClient {
    async fn level_by_time(&self, at: OffsetDateTime) -> Result<u64, TzktError> {
        let at = at.format(&Rfc3339).map_err(|e| TzktError::Record {
            id: 0,
            reason: e.to_string(),
        })?;
        self.get_json(&format!("v1/blocks/{at}/level"), &[]).await
    }

    async fn token_transfers(
        &self,
        level: u64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TokenTransferRecord>, TzktError> {
        self.get_json(
            "v1/tokens/transfers",
            &[
                ("level", level.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
                ("sort.asc", "id".to_owned()),
            ],
        )
        .await
    }

    async fn token_metadata_updates(
        &self,
        level: u64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<BigMapUpdateRecord>, TzktError> {
        self.get_json(
            "v1/bigmaps/updates",
            &[
                ("tags.any", TOKEN_METADATA_TAG.to_owned()),
                ("action.in", BigMapUpdateRecord::METADATA_ACTIONS.join(",")),
                ("level", level.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
                ("sort.asc", "id".to_owned()),
            ],
        )
        .await
    }
}

/// Payload of a `transfers` or `bigmaps` hub invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TzktMessage<T> {
    /// 0 = subscription state, 1 = data, 2 = reorg
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub state: u64,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// `TzktMessage::kind` of a subscription state message.
pub const MESSAGE_STATE: u8 = 0;
/// `TzktMessage::kind` of a data message.
pub const MESSAGE_DATA: u8 = 1;
/// `TzktMessage::kind` of a reorg notice.
pub const MESSAGE_REORG: u8 = 2;

#[cfg(test)]
mod tests {
    use super::*;
    use nftevents_sdk::objects::EventType;
    use time::macros::datetime;

    const TRANSFER: &str = r#"{
        "id": 409112345,
        "level": 3400001,
        "timestamp": "2023-05-01T12:00:00Z",
        "token": {
            "id": 1,
            "contract": {"address": "KT1RJ6PbjHpwc3M5rw5s2Nbmefwbuwbdxton"},
            "tokenId": "000154"
        },
        "from": {"address": "tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb"},
        "to": {"address": "tz1aSkwEot3L2kmUvcoxzjMomb9mvBNuzFK6"},
        "amount": "1",
        "transactionId": 409112300
    }"#;

    #[test]
    fn transfer_record_converts_to_event() {
        let record: TokenTransferRecord = serde_json::from_str(TRANSFER).unwrap();
        let event = record.into_event().unwrap();
        assert_eq!(event.event_type(), EventType::Transfer);
        assert_eq!(event.token_id().as_str(), "154");
        assert_eq!(event.tx_id(), "409112300");
        assert_eq!(event.level(), Some(3_400_001));
        assert_eq!(event.tx_time(), datetime!(2023-05-01 12:00:00 UTC));
        assert_eq!(event.contract_address(), "KT1RJ6PbjHpwc3M5rw5s2Nbmefwbuwbdxton");
    }

    #[test]
    fn transfer_without_source_is_mint_with_origination_fallback() {
        let mut record: TokenTransferRecord = serde_json::from_str(TRANSFER).unwrap();
        record.from = None;
        record.transaction_id = None;
        record.origination_id = Some(77);
        let event = record.into_event().unwrap();
        assert_eq!(event.event_type(), EventType::Mint);
        assert_eq!(event.from(), "");
        assert_eq!(event.tx_id(), "77");
    }

    #[test]
    fn transfer_without_target_is_a_transfer() {
        let mut record: TokenTransferRecord = serde_json::from_str(TRANSFER).unwrap();
        record.to = None;
        record.transaction_id = None;
        let event = record.into_event().unwrap();
        assert_eq!(event.event_type(), EventType::Transfer);
        assert_eq!(event.to(), "");
        assert_eq!(event.tx_id(), "409112345");
    }

    #[test]
    fn metadata_update_takes_token_id_from_value() {
        let record: BigMapUpdateRecord = serde_json::from_str(
            r#"{
                "id": 88001,
                "level": 3400002,
                "timestamp": "2023-05-01T12:00:30Z",
                "bigmap": 514,
                "contract": {"address": "KT1RJ6PbjHpwc3M5rw5s2Nbmefwbuwbdxton"},
                "path": "token_metadata",
                "action": "update_key",
                "content": {
                    "hash": "exprv",
                    "key": "12",
                    "value": {"token_id": "12", "token_info": {"": "697066733a2f2f"}}
                }
            }"#,
        )
        .unwrap();
        let event = record.into_event().unwrap().unwrap();
        assert_eq!(event.event_type(), EventType::TokenUpdated);
        assert_eq!(event.token_id().as_str(), "12");
        assert_eq!(event.tx_id(), "88001");
        assert_eq!(event.level(), Some(3_400_002));
    }

    #[test]
    fn key_creation_is_ignored() {
        let record: BigMapUpdateRecord = serde_json::from_str(
            r#"{
                "id": 1,
                "level": 2,
                "timestamp": "2023-05-01T12:00:30Z",
                "contract": {"address": "KT1RJ6PbjHpwc3M5rw5s2Nbmefwbuwbdxton"},
                "action": "add_key",
                "content": {"key": "1", "value": {"token_id": "1"}}
            }"#,
        )
        .unwrap();
        assert!(record.into_event().unwrap().is_none());
    }

    #[test]
    fn endpoints_are_relative_to_base_path() {
        let client = TzktClient::new(
            Url::parse("https://gw.example/tzkt").unwrap(),
            Duration::from_secs(1),
        );
        assert_eq!(
            client.endpoint("v1/tokens/transfers").unwrap().as_str(),
            "https://gw.example/tzkt/v1/tokens/transfers"
        );
    }

    #[test]
    fn hub_message_without_data_parses() {
        let message: TzktMessage<TokenTransferRecord> =
            serde_json::from_str(r#"{"type":0,"state":3400000}"#).unwrap();
        assert_eq!(message.kind, MESSAGE_STATE);
        assert!(message.data.is_empty());
    }
}
