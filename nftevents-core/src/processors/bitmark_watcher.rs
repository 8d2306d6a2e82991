//! BitmarkWatcher processor.
//!
//! Listens for `new_transfers` notifications on the ledger database. Each
//! payload names an `event` row listing transaction ids; every transaction is
//! fetched from the Bitmark API and pushed in listed order.
//!
//! There is no checkpoint. Notifications sent while the listener is
//! disconnected are lost.

use std::sync::Arc;

use kanau::processor::Processor;
use sqlx::postgres::PgListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::WatcherError;
use crate::emitter::SharedSink;
use crate::events::{
    LedgerNotification, LedgerNotificationReceiver, LedgerNotificationSender,
    ledger_notification_channel,
};
use crate::sources::bitmark::{LedgerError, LedgerLookup};

/// Resolves a notification into ledger transfers and pushes them.
#[derive(Clone)]
pub struct LedgerNotificationHandler {
    ledger: Arc<dyn LedgerLookup>,
    sink: SharedSink,
}

impl LedgerNotificationHandler {
    pub fn new(ledger: Arc<dyn LedgerLookup>, sink: SharedSink) -> Self {
        Self { ledger, sink }
    }

    async fn drain(self, mut notification_rx: LedgerNotificationReceiver) {
        while let Some(notification) = notification_rx.recv().await {
            let event_id = notification.event_id.clone();
            match self.process(notification).await {
                Ok(pushed) => debug!(event_id = %event_id, pushed, "Handled ledger notification"),
                Err(e) => warn!(event_id = %event_id, error = %e, "Skipping ledger notification"),
            }
        }
        info!("Ledger notification channel closed");
    }
}

impl Processor<LedgerNotification> for LedgerNotificationHandler {
    /// Number of transfers pushed.
    type Output = usize;
    type Error = LedgerError;

    async fn process(&self, notification: LedgerNotification) -> Result<usize, LedgerError> {
        let tx_ids = self.ledger.transfer_ids(&notification.event_id).await?;
        let mut pushed = 0;
        for tx_id in &tx_ids {
            let transaction = match self.ledger.transaction(tx_id).await {
                Ok(transaction) => transaction,
                Err(e) => {
                    warn!(tx_id = %tx_id, error = %e, "Failed to fetch ledger transaction");
                    continue;
                }
            };
            let event = match transaction.into_event(notification.received_at) {
                Ok(event) => event,
                Err(e) => {
                    warn!(tx_id = %tx_id, error = %e, "Skipping ledger transaction");
                    continue;
                }
            };
            match self.sink.push(&event).await {
                Ok(()) => pushed += 1,
                Err(e) => error!(tx_id = %tx_id, error = %e, "Failed to push ledger transfer"),
            }
        }
        Ok(pushed)
    }
}

pub struct BitmarkWatcher {
    handler: LedgerNotificationHandler,
    database_url: String,
    channel: String,
}

impl BitmarkWatcher {
    pub fn new(
        ledger: Arc<dyn LedgerLookup>,
        sink: SharedSink,
        database_url: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            handler: LedgerNotificationHandler::new(ledger, sink),
            database_url: database_url.into(),
            channel: channel.into(),
        }
    }

    /// Listen until shutdown or a listener failure.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> Result<(), WatcherError> {
        let mut listener = PgListener::connect(&self.database_url).await?;
        listener.listen(&self.channel).await?;
        info!(channel = %self.channel, "BitmarkWatcher listening");

        let (notification_tx, notification_rx) = ledger_notification_channel();
        let consumer = tokio::spawn(self.handler.clone().drain(notification_rx));

        let result = Self::receive(&mut listener, notification_tx, shutdown_rx).await;

        if let Err(e) = consumer.await {
            error!(error = %e, "Ledger notification consumer failed");
        }
        match &result {
            Ok(()) => info!("BitmarkWatcher shutdown complete"),
            Err(e) => error!(error = %e, "BitmarkWatcher stopped"),
        }
        result
    }

    async fn receive(
        listener: &mut PgListener,
        notification_tx: LedgerNotificationSender,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), WatcherError> {
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("BitmarkWatcher received shutdown signal");
                        return Ok(());
                    }
                }

                received = listener.try_recv() => match received? {
                    Some(notification) => {
                        let notification = LedgerNotification::received_now(notification.payload());
                        if notification_tx.send(notification).await.is_err() {
                            warn!("Ledger notification consumer is gone");
                            return Ok(());
                        }
                    }
                    // The next try_recv reconnects.
                    None => warn!("Ledger listener connection lost, notifications may have been missed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::testing::RecordingSink;
    use crate::sources::bitmark::LedgerTransaction;
    use async_trait::async_trait;
    use nftevents_sdk::objects::EventType;
    use std::collections::HashMap;
    use time::macros::datetime;

    struct FakeLedger {
        events: HashMap<String, Vec<String>>,
        transactions: HashMap<String, LedgerTransaction>,
    }

    #[async_trait]
    impl LedgerLookup for FakeLedger {
        async fn transfer_ids(&self, event_id: &str) -> Result<Vec<String>, LedgerError> {
            self.events
                .get(event_id)
                .cloned()
                .ok_or_else(|| LedgerError::InvalidEventId(event_id.to_owned()))
        }

        async fn transaction(&self, tx_id: &str) -> Result<LedgerTransaction, LedgerError> {
            self.transactions
                .get(tx_id)
                .cloned()
                .ok_or_else(|| LedgerError::InvalidBitmarkId(tx_id.to_owned()))
        }
    }

    fn ledger_tx(id: &str, bitmark_id: &str, owner: &str, previous: Option<&str>) -> LedgerTransaction {
        LedgerTransaction {
            id: id.to_owned(),
            owner: owner.to_owned(),
            bitmark_id: bitmark_id.to_owned(),
            previous_owner: previous.map(str::to_owned),
        }
    }

    fn ledger() -> Arc<FakeLedger> {
        Arc::new(FakeLedger {
            events: HashMap::from([
                ("7".to_owned(), vec!["0a".to_owned(), "0b".to_owned()]),
                ("8".to_owned(), vec!["0c".to_owned(), "0b".to_owned()]),
            ]),
            transactions: HashMap::from([
                ("0a".to_owned(), ledger_tx("0a", "0a", "alice", None)),
                ("0b".to_owned(), ledger_tx("0b", "0a", "bob", Some("alice"))),
            ]),
        })
    }

    fn notification(event_id: &str) -> LedgerNotification {
        LedgerNotification {
            event_id: event_id.to_owned(),
            received_at: datetime!(2022-03-04 05:06:07 UTC),
        }
    }

    #[tokio::test]
    async fn pushes_transfers_in_listed_order() {
        let sink = Arc::new(RecordingSink::default());
        let handler = LedgerNotificationHandler::new(ledger(), sink.clone());

        let pushed = handler.process(notification("7")).await.unwrap();

        assert_eq!(pushed, 2);
        let events = sink.pushed();
        assert_eq!(events[0].event_type(), EventType::Mint);
        assert_eq!(events[0].tx_id(), "0a");
        assert_eq!(events[0].token_id().as_str(), "10");
        assert_eq!(events[1].event_type(), EventType::Transfer);
        assert_eq!(events[1].from(), "alice");
        assert_eq!(events[1].to(), "bob");
        assert!(events.iter().all(|e| e.tx_time() == datetime!(2022-03-04 05:06:07 UTC)));
    }

    #[tokio::test]
    async fn failed_lookup_skips_only_that_transaction() {
        let sink = Arc::new(RecordingSink::default());
        let handler = LedgerNotificationHandler::new(ledger(), sink.clone());

        let pushed = handler.process(notification("8")).await.unwrap();

        assert_eq!(pushed, 1);
        assert_eq!(sink.pushed()[0].tx_id(), "0b");
    }

    #[tokio::test]
    async fn unknown_event_is_an_error() {
        let sink = Arc::new(RecordingSink::default());
        let handler = LedgerNotificationHandler::new(ledger(), sink.clone());

        assert!(handler.process(notification("99")).await.is_err());
        assert!(sink.pushed().is_empty());
    }

    #[tokio::test]
    async fn rejected_push_is_not_counted() {
        let sink = Arc::new(RecordingSink::rejecting(500));
        let handler = LedgerNotificationHandler::new(ledger(), sink);

        assert_eq!(handler.process(notification("7")).await.unwrap(), 0);
    }
}
