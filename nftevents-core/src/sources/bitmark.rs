//! Bitmark ledger access: the ledger database's `event` table and the
//! Bitmark REST API.

use std::time::Duration;

use alloy::primitives::U512;
use async_trait::async_trait;
use kanau::processor::Processor;
use nftevents_sdk::client::directory_url;
use nftevents_sdk::objects::{Blockchain, CanonicalEvent, TokenId, TokenTransfer};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::entities::ledger_event::{GetLedgerEventValue, split_transaction_ids};
use crate::framework::DatabaseProcessor;

/// Errors of ledger lookups.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transport-level failure talking to the Bitmark API
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the Bitmark API
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint URL could not be built
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Notification payload is not an event row id
    #[error("invalid event id {0:?}")]
    InvalidEventId(String),

    /// No `event` row with this id
    #[error("event {0} not found")]
    EventNotFound(i64),

    /// Bitmark id is not a hex hash
    #[error("invalid bitmark id {0:?}")]
    InvalidBitmarkId(String),
}

/// A ledger transaction as returned by `GET /v1/txs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub owner: String,
    pub bitmark_id: String,
    #[serde(default)]
    pub previous_owner: Option<String>,
}

impl LedgerTransaction {
    /// The issue transaction of a bitmark has the bitmark's own id.
    pub fn is_issue(&self) -> bool {
        self.bitmark_id == self.id
    }

    /// Decimal form of the hex bitmark id.
    pub fn token_id(&self) -> Result<TokenId, LedgerError> {
        let invalid = || LedgerError::InvalidBitmarkId(self.bitmark_id.clone());
        let value = U512::from_str_radix(&self.bitmark_id, 16).map_err(|_| invalid())?;
        TokenId::from_decimal(&value.to_string()).map_err(|_| invalid())
    }

    pub fn into_event(self, tx_time: OffsetDateTime) -> Result<CanonicalEvent, LedgerError> {
        let token_id = self.token_id()?;
        let from = if self.is_issue() {
            None
        } else {
            Some(self.previous_owner.unwrap_or_default())
        };
        Ok(CanonicalEvent::transfer(
            Blockchain::Bitmark,
            TokenTransfer {
                from,
                to: self.owner,
                contract_address: String::new(),
                token_id,
                tx_id: self.id,
                event_index: 0,
                tx_time,
                level: None,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    tx: LedgerTransaction,
}

/// Ledger queries used by the Bitmark watcher.
#[async_trait]
pub trait LedgerLookup: Send + Sync {
    /// Transaction ids behind a `new_transfers` notification, in ledger order.
    async fn transfer_ids(&self, event_id: &str) -> Result<Vec<String>, LedgerError>;

    async fn transaction(&self, tx_id: &str) -> Result<LedgerTransaction, LedgerError>;
}

/// Ledger database plus Bitmark REST API.
#[derive(Debug, Clone)]
pub struct BitmarkLedger {
    db: DatabaseProcessor,
    http: Client,
    api_url: Url,
}

impl BitmarkLedger {
    pub fn new(db: DatabaseProcessor, api_url: Url, timeout: Duration) -> Self {
        Self {
            db,
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_url: directory_url(api_url),
        }
    }

    fn transaction_url(&self, tx_id: &str) -> Result<Url, LedgerError> {
        Ok(self.api_url.join(&format!("v1/txs/{tx_id}"))?)
    }
}

#[async_trait]
impl LedgerLookup for BitmarkLedger {
    async fn transfer_ids(&self, event_id: &str) -> Result<Vec<String>, LedgerError> {
        let event_id: i64 = event_id
            .trim()
            .parse()
            .map_err(|_| LedgerError::InvalidEventId(event_id.to_owned()))?;
        let value = self
            .db
            .process(GetLedgerEventValue { event_id })
            .await?
            .ok_or(LedgerError::EventNotFound(event_id))?;
        Ok(split_transaction_ids(&value)
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    async fn transaction(&self, tx_id: &str) -> Result<LedgerTransaction, LedgerError> {
        let url = self.transaction_url(tx_id)?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        let response: TransactionResponse = serde_json::from_slice(&bytes)?;
        Ok(response.tx)
    }
}
