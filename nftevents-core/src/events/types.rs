use time::OffsetDateTime;

/// One `new_transfers` notification from the ledger database.
///
/// Carries the event row id from the payload and the moment it was received.
/// The ledger records have no timestamp of their own, so the receipt time is
/// used as the transaction time of every transfer behind this notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerNotification {
    pub event_id: String,
    pub received_at: OffsetDateTime,
}

impl LedgerNotification {
    pub fn received_now(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            received_at: OffsetDateTime::now_utc(),
        }
    }
}
