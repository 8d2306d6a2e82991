//! Emitter: the single exit point of every watcher.
//!
//! Watchers hold an `Arc<dyn EventSink>` and call [`EventSink::push`] once
//! per canonical event. Failures are surfaced to the caller and never retried
//! here.

use std::sync::Arc;

use async_trait::async_trait;
use nftevents_sdk::client::{ClientError, ProcessorClient};
use nftevents_sdk::objects::{CanonicalEvent, EventInput};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while pushing an event downstream.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Transport or protocol failure talking to the processor
    #[error("event processor request failed: {0}")]
    Client(#[from] ClientError),

    /// The processor answered with a status other than 200
    #[error("event processor rejected event with status {0}")]
    Rejected(i32),
}

/// Destination of canonical events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn push(&self, event: &CanonicalEvent) -> Result<(), EmitError>;
}

/// Shared handle to an event sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Stateless emitter forwarding events to the event processor over HTTP.
#[derive(Debug, Clone)]
pub struct Emitter {
    client: ProcessorClient,
}

impl Emitter {
    pub fn new(client: ProcessorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSink for Emitter {
    async fn push(&self, event: &CanonicalEvent) -> Result<(), EmitError> {
        let input = EventInput::from(event);
        let response = self.client.push_event(&input).await?;
        if !response.is_accepted() {
            return Err(EmitError::Rejected(response.status));
        }
        debug!(
            blockchain = %event.blockchain(),
            event_type = %event.event_type(),
            tx_id = event.tx_id(),
            event_index = event.event_index(),
            "Pushed event"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink recording every pushed event. Can be told to reject all pushes.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<CanonicalEvent>>,
        pub reject_with: Option<i32>,
    }

    impl RecordingSink {
        pub fn rejecting(status: i32) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                reject_with: Some(status),
            }
        }

        pub fn pushed(&self) -> Vec<CanonicalEvent> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn push(&self, event: &CanonicalEvent) -> Result<(), EmitError> {
            if let Some(status) = self.reject_with {
                return Err(EmitError::Rejected(status));
            }
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
            Ok(())
        }
    }
}
