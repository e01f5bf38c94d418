//! In-memory event bus for tests/dev.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription, TopicFilter};
use crate::envelope::EventEnvelope;

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    #[error("event bus subscriber list poisoned")]
    Poisoned,
}

/// In-process fan-out to topic-filtered subscribers.
///
/// Subscribers whose receiver has been dropped are pruned on publish.
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<(TopicFilter, mpsc::Sender<EventEnvelope>)>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl EventBus for InMemoryEventBus {
    type Error = InMemoryBusError;

    fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|(filter, tx)| {
            if filter.accepts(envelope.topic()) {
                tx.send(envelope.clone()).is_ok()
            } else {
                true
            }
        });
        tracing::debug!(topic = envelope.topic(), event_id = %envelope.event_id(), "event published");
        Ok(())
    }

    fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((filter, tx));
        }
        Subscription::new(rx)
    }
}
