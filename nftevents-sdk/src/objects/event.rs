//! Canonical event model.
//!
//! Every watcher converts its chain's native records into a
//! [`CanonicalEvent`] before handing it to the emitter. The event type is
//! never supplied by callers: it is derived from the transfer parties
//! relative to the chain's zero addresses.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::blockchains::Blockchain;

/// Kind of ownership change carried by a canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Mint,
    Transfer,
    Burned,
    TokenUpdated,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::Mint => "mint",
            EventType::Transfer => "transfer",
            EventType::Burned => "burned",
            EventType::TokenUpdated => "token_updated",
        }
    }

    /// Derive the event type of a transfer.
    ///
    /// - no source account, or a source equal to a zero address: `mint`
    /// - target equal to a zero address: `burned`
    /// - anything else: `transfer`
    ///
    /// Only Ethereum has zero addresses, so Tezos and Bitmark transfers are
    /// never `burned`.
    pub fn derive(blockchain: Blockchain, from: Option<&str>, to: &str) -> Self {
        match from {
            None => EventType::Mint,
            Some(from) if blockchain.is_zero_address(from) => EventType::Mint,
            Some(_) if blockchain.is_zero_address(to) => EventType::Burned,
            Some(_) => EventType::Transfer,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenIdError {
    #[error("token id is empty")]
    Empty,
    #[error("token id is not a decimal number: {0}")]
    NotDecimal(String),
}

/// A token identifier in canonical decimal form.
///
/// Token identifiers can be up to 256 bits wide, so they are kept as a
/// normalized decimal string (no sign, no leading zeros) instead of a
/// fixed-width integer. Conversions from hex or big-endian byte forms happen
/// in the watchers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Parse a decimal token id, stripping leading zeros.
    pub fn from_decimal(value: &str) -> Result<Self, TokenIdError> {
        if value.is_empty() {
            return Err(TokenIdError::Empty);
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenIdError::NotDecimal(value.to_owned()));
        }
        let trimmed = value.trim_start_matches('0');
        if trimmed.is_empty() {
            Ok(Self("0".to_owned()))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for TokenId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for TokenId {
    type Error = TokenIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_decimal(&value)
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Native transfer, already decoded by a watcher.
#[derive(Debug, Clone)]
pub struct TokenTransfer {
    /// Previous owner. `None` when the chain reports no source account.
    pub from: Option<String>,
    pub to: String,
    pub contract_address: String,
    pub token_id: TokenId,
    pub tx_id: String,
    /// Position of the transfer within its transaction (Ethereum log index).
    pub event_index: u64,
    pub tx_time: OffsetDateTime,
    pub level: Option<u64>,
}

/// Native token metadata change, already decoded by a watcher.
#[derive(Debug, Clone)]
pub struct TokenMetadataUpdate {
    pub contract_address: String,
    pub token_id: TokenId,
    pub tx_id: String,
    pub tx_time: OffsetDateTime,
    pub level: Option<u64>,
}

/// The chain-independent event pushed to the event processor.
///
/// Fields are private: an event can only be built through
/// [`CanonicalEvent::transfer`] or [`CanonicalEvent::token_updated`] and is
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalEvent {
    event_type: EventType,
    from: String,
    to: String,
    contract_address: String,
    blockchain: Blockchain,
    token_id: TokenId,
    tx_id: String,
    event_index: u64,
    #[serde(with = "time::serde::rfc3339")]
    tx_time: OffsetDateTime,
    level: Option<u64>,
}

impl CanonicalEvent {
    /// Build an event from a transfer, deriving its type.
    ///
    /// A mint always has an empty `from`, including when the chain reported
    /// the zero address as the source.
    pub fn transfer(blockchain: Blockchain, transfer: TokenTransfer) -> Self {
        let event_type = EventType::derive(blockchain, transfer.from.as_deref(), &transfer.to);
        let from = match event_type {
            EventType::Mint => String::new(),
            _ => transfer.from.unwrap_or_default(),
        };
        Self {
            event_type,
            from,
            to: transfer.to,
            contract_address: transfer.contract_address,
            blockchain,
            token_id: transfer.token_id,
            tx_id: transfer.tx_id,
            event_index: transfer.event_index,
            tx_time: transfer.tx_time,
            level: transfer.level,
        }
    }

    /// Build a `token_updated` event. Metadata updates have no parties.
    pub fn token_updated(blockchain: Blockchain, update: TokenMetadataUpdate) -> Self {
        Self {
            event_type: EventType::TokenUpdated,
            from: String::new(),
            to: String::new(),
            contract_address: update.contract_address,
            blockchain,
            token_id: update.token_id,
            tx_id: update.tx_id,
            event_index: 0,
            tx_time: update.tx_time,
            level: update.level,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    pub fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Distinguishes several events of one transaction.
    pub fn event_index(&self) -> u64 {
        self.event_index
    }

    pub fn tx_time(&self) -> OffsetDateTime {
        self.tx_time
    }

    pub fn level(&self) -> Option<u64> {
        self.level
    }
}
