//! Outbox relay: publishes committed events to the bus.
//!
//! Delivery is at-least-once. A crash between publish and the
//! `published_at` update re-sends the batch, so consumers dedupe on
//! `event_id`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use neoledger_core::{LedgerError, LedgerResult};
use neoledger_events::EventBus;

use crate::store::Store;

pub const DEFAULT_BATCH_SIZE: u32 = 100;

#[derive(Clone)]
pub struct OutboxRelay {
    store: Arc<dyn Store>,
    batch_size: u32,
}

impl OutboxRelay {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Publish one batch of pending messages. Returns how many were marked published.
    ///
    /// Stops at the first publish failure: messages before it are still marked
    /// and committed, then the publish error is returned.
    pub async fn relay_pending<B: EventBus>(&self, bus: &B) -> LedgerResult<usize> {
        let mut tx = self.store.begin("relay_outbox").await?;
        let pending = tx.lock_pending_outbox(self.batch_size).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut published = Vec::with_capacity(pending.len());
        let mut failure = None;
        for message in pending {
            let id = message.id();
            let topic = message.envelope.topic().to_string();
            match bus.publish(message.envelope) {
                Ok(()) => published.push(id),
                Err(e) => {
                    tracing::warn!(event_id = %id, topic = %topic, error = %e, "outbox publish failed");
                    failure = Some(LedgerError::internal("relay_outbox", e));
                    break;
                }
            }
        }

        tx.mark_published(&published, Utc::now()).await?;
        tx.commit().await?;
        tracing::debug!(count = published.len(), "outbox batch relayed");

        match failure {
            Some(e) => Err(e),
            None => Ok(published.len()),
        }
    }

    /// Poll until `shutdown` flips to true.
    pub async fn run<B: EventBus>(self, bus: B, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(batch_size = self.batch_size, interval_ms = interval.as_millis() as u64, "outbox relay started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Drain the backlog before waiting for the next tick.
                    loop {
                        match self.relay_pending(&bus).await {
                            Ok(n) if n as u32 >= self.batch_size => continue,
                            Ok(_) => break,
                            Err(e) => {
                                tracing::warn!(error = %e, "outbox relay pass failed");
                                break;
                            }
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("outbox relay stopped");
    }
}
