//! TezosWatcher processor.
//!
//! Connects to the TzKT event hub, replays every level since the stored
//! checkpoint through the REST API, then streams live token transfers and
//! token-metadata changes. A single consumer pushes the events and moves the
//! checkpoint forward.
//!
//! Any hub failure is fatal. The next start catches up from the checkpoint.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use kanau::processor::Processor;
use nftevents_sdk::objects::CanonicalEvent;
use reqwest::Client;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use super::WatcherError;
use crate::checkpoint::Watermark;
use crate::emitter::{EmitError, SharedSink};
use crate::events::{CanonicalEventReceiver, CanonicalEventSender, canonical_event_channel};
use crate::sources::tzkt::{BigMapUpdateRecord, TezosExplorer, TokenTransferRecord};
use crate::sources::tzkt_hub::{LiveBatch, TezosEventFeed, TzktEventHub};

/// Records per REST page during catch-up.
pub const PAGE_SIZE: u64 = 100;

/// Pushes Tezos events and advances the checkpoint.
#[derive(Clone)]
pub struct TezosEventProcessor {
    sink: SharedSink,
    watermark: Watermark,
}

impl TezosEventProcessor {
    pub fn new(sink: SharedSink, watermark: Watermark) -> Self {
        Self { sink, watermark }
    }

    async fn drain(self, mut event_rx: CanonicalEventReceiver) {
        while let Some(event) = event_rx.recv().await {
            let tx_id = event.tx_id().to_owned();
            if let Err(e) = self.process(event).await {
                error!(tx_id = %tx_id, error = %e, "Failed to push Tezos event");
            }
        }
        info!("Tezos event channel closed");
    }
}

impl Processor<CanonicalEvent> for TezosEventProcessor {
    /// Whether the checkpoint moved.
    type Output = bool;
    type Error = EmitError;

    async fn process(&self, event: CanonicalEvent) -> Result<bool, EmitError> {
        self.sink.push(&event).await?;
        match event.level() {
            Some(level) => Ok(self.watermark.advance(level).await),
            None => Ok(false),
        }
    }
}

pub struct TezosWatcher {
    explorer: Arc<dyn TezosExplorer>,
    processor: TezosEventProcessor,
}

impl TezosWatcher {
    pub fn new(explorer: Arc<dyn TezosExplorer>, sink: SharedSink, watermark: Watermark) -> Self {
        Self {
            explorer,
            processor: TezosEventProcessor::new(sink, watermark),
        }
    }

    /// Connect to the event hub and run until shutdown or a fatal error.
    pub async fn run(
        self,
        hub_url: &Url,
        connect_timeout: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), WatcherError> {
        let http = Client::builder()
            .timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        let hub = TzktEventHub::connect(hub_url, &http, connect_timeout).await?;
        info!(hub = %hub_url, "Connected to TzKT event hub");
        self.run_with_feed(hub, shutdown_rx).await
    }

    /// Catch up, subscribe and stream from an already connected feed.
    pub async fn run_with_feed<F: TezosEventFeed>(
        self,
        mut feed: F,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), WatcherError> {
        info!("TezosWatcher started");

        let (event_tx, event_rx) = canonical_event_channel();
        let consumer = tokio::spawn(self.processor.clone().drain(event_rx));

        let result = self.stream(&mut feed, event_tx, shutdown_rx).await;

        if let Err(e) = consumer.await {
            error!(error = %e, "Tezos event consumer failed");
        }
        match &result {
            Ok(()) => info!("TezosWatcher shutdown complete"),
            Err(e) => error!(error = %e, "TezosWatcher stopped"),
        }
        result
    }

    async fn stream<F: TezosEventFeed>(
        &self,
        feed: &mut F,
        event_tx: CanonicalEventSender,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), WatcherError> {
        match self.processor.watermark.load().await {
            Some(last) => {
                if self.catch_up(last, &event_tx, &shutdown_rx).await.is_break() {
                    return Ok(());
                }
            }
            None => info!(key = self.processor.watermark.key(), "Skipping Tezos catch-up"),
        }

        feed.subscribe().await?;
        info!("Subscribed to token transfers and token metadata updates");

        let mut first_transfers = true;
        let mut first_updates = true;
        loop {
            let batch = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("TezosWatcher received shutdown signal");
                        return Ok(());
                    }
                    continue;
                }

                batch = feed.next_batch() => batch?,
            };

            let first = match &batch {
                LiveBatch::Transfers(_) => std::mem::replace(&mut first_transfers, false),
                LiveBatch::MetadataUpdates(_) => std::mem::replace(&mut first_updates, false),
                LiveBatch::Ignored => continue,
            };
            if first {
                let watermark = self.processor.watermark.current();
                if watermark > 0 {
                    info!(watermark, "Closing gap before first live batch");
                    if self.catch_up(watermark, &event_tx, &shutdown_rx).await.is_break() {
                        return Ok(());
                    }
                }
            }

            let flow = match batch {
                LiveBatch::Transfers(records) => enqueue_transfers(records, &event_tx).await,
                LiveBatch::MetadataUpdates(records) => enqueue_updates(records, &event_tx).await,
                LiveBatch::Ignored => ControlFlow::Continue(()),
            };
            if flow.is_break() {
                return Ok(());
            }
        }
    }

    /// Replay every level from `from` to the current head, inclusive.
    async fn catch_up(
        &self,
        from: u64,
        event_tx: &CanonicalEventSender,
        shutdown_rx: &watch::Receiver<bool>,
    ) -> ControlFlow<()> {
        let head = match self.explorer.level_by_time(OffsetDateTime::now_utc()).await {
            Ok(head) => head,
            Err(e) => {
                error!(error = %e, "Failed to resolve head level, skipping catch-up");
                return ControlFlow::Continue(());
            }
        };
        info!(from, head, "Catching up Tezos events");

        for level in from..=head {
            if *shutdown_rx.borrow() {
                info!(level, "Catch-up interrupted by shutdown");
                return ControlFlow::Break(());
            }
            self.catch_up_level(level, event_tx).await?;
        }
        info!(head, "Tezos catch-up complete");
        ControlFlow::Continue(())
    }

    async fn catch_up_level(&self, level: u64, event_tx: &CanonicalEventSender) -> ControlFlow<()> {
        let mut offset = 0;
        loop {
            match self.explorer.token_transfers(level, offset, PAGE_SIZE).await {
                Ok(page) => {
                    let full = page.len() as u64 >= PAGE_SIZE;
                    enqueue_transfers(page, event_tx).await?;
                    if !full {
                        break;
                    }
                    offset += PAGE_SIZE;
                }
                Err(e) => {
                    warn!(level, offset, error = %e, "Failed to fetch token transfers");
                    break;
                }
            }
        }

        offset = 0;
        loop {
            match self.explorer.token_metadata_updates(level, offset, PAGE_SIZE).await {
                Ok(page) => {
                    let full = page.len() as u64 >= PAGE_SIZE;
                    enqueue_updates(page, event_tx).await?;
                    if !full {
                        break;
                    }
                    offset += PAGE_SIZE;
                }
                Err(e) => {
                    warn!(level, offset, error = %e, "Failed to fetch token metadata updates");
                    break;
                }
            }
        }
        debug!(level, "Level caught up");
        ControlFlow::Continue(())
    }
}

async fn enqueue(event: CanonicalEvent, event_tx: &CanonicalEventSender) -> ControlFlow<()> {
    if event_tx.send(event).await.is_err() {
        warn!("Tezos event consumer is gone");
        return ControlFlow::Break(());
    }
    ControlFlow::Continue(())
}

async fn enqueue_transfers(
    records: Vec<TokenTransferRecord>,
    event_tx: &CanonicalEventSender,
) -> ControlFlow<()> {
    for record in records {
        match record.into_event() {
            Ok(event) => enqueue(event, event_tx).await?,
            Err(e) => warn!(error = %e, "Skipping Tezos token transfer"),
        }
    }
    ControlFlow::Continue(())
}

async fn enqueue_updates(
    records: Vec<BigMapUpdateRecord>,
    event_tx: &CanonicalEventSender,
) -> ControlFlow<()> {
    for record in records {
        match record.into_event() {
            Ok(Some(event)) => enqueue(event, event_tx).await?,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping Tezos metadata update"),
        }
    }
    ControlFlow::Continue(())
}
