use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::blockchains::Blockchain;
use super::event::{CanonicalEvent, EventType, TokenId};

/// Request body of `POST /v1/events` on the event processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInput {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub blockchain: Blockchain,
    pub contract: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "tokenID")]
    pub token_id: TokenId,
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(rename = "eventIndex", default)]
    pub event_index: u64,
    #[serde(default)]
    pub level: u64,
    #[serde(rename = "txTime", with = "time::serde::rfc3339")]
    pub tx_time: OffsetDateTime,
}

impl From<&CanonicalEvent> for EventInput {
    fn from(event: &CanonicalEvent) -> Self {
        Self {
            event_type: event.event_type(),
            blockchain: event.blockchain(),
            contract: event.contract_address().to_owned(),
            from: event.from().to_owned(),
            to: event.to().to_owned(),
            token_id: event.token_id().clone(),
            tx_id: event.tx_id().to_owned(),
            event_index: event.event_index(),
            level: event.level().unwrap_or_default(),
            tx_time: event.tx_time(),
        }
    }
}

/// Response body of `POST /v1/events`. Anything but `200` is a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub status: i32,
}

impl PushResponse {
    pub const ACCEPTED: i32 = 200;

    pub fn is_accepted(&self) -> bool {
        self.status == Self::ACCEPTED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::event::TokenTransfer;
    use time::macros::datetime;

    #[test]
    fn event_input_uses_processor_field_names() {
        let event = CanonicalEvent::transfer(
            Blockchain::Bitmark,
            TokenTransfer {
                from: Some("eZpG6Wi9SQvpDatEP7QGrx6nvzwd6s6R8DgMKgDbDY1R28u4hS".to_owned()),
                to: "ec6yMcJATX6gjNwvqp8rbc4jNEasoUgbfBBGGyV5NvoJ54NXva".to_owned(),
                contract_address: String::new(),
                token_id: TokenId::from(255),
                tx_id: "abc".to_owned(),
                event_index: 0,
                tx_time: datetime!(2022-01-02 03:04:05 UTC),
                level: None,
            },
        );
        let value = serde_json::to_value(EventInput::from(&event)).unwrap();
        assert_eq!(value["type"], "transfer");
        assert_eq!(value["blockchain"], "bitmark");
        assert_eq!(value["contract"], "");
        assert_eq!(value["tokenID"], "255");
        assert_eq!(value["txID"], "abc");
        assert_eq!(value["eventIndex"], 0);
        assert_eq!(value["level"], 0);
        assert_eq!(value["txTime"], "2022-01-02T03:04:05Z");
    }

    #[test]
    fn only_200_is_accepted() {
        let accepted: PushResponse = serde_json::from_str(r#"{"status":200}"#).unwrap();
        let rejected: PushResponse = serde_json::from_str(r#"{"status":500}"#).unwrap();
        assert!(accepted.is_accepted());
        assert!(!rejected.is_accepted());
    }
}
