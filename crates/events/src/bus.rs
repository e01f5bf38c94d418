//! Event publishing/subscription abstraction (mechanics only).
//!
//! The outbox is the source of truth; the bus only distributes envelopes that
//! are already committed. Delivery is at-least-once: a relay that crashes
//! between publishing and marking a row published will publish it again, so
//! consumers must be idempotent on `event_id`.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::envelope::EventEnvelope;

/// Which topics a subscriber wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    All,
    /// Topics starting with the prefix, e.g. `"wallet."`.
    Prefix(String),
}

impl TopicFilter {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        TopicFilter::Prefix(prefix.into())
    }

    pub fn accepts(&self, topic: &str) -> bool {
        match self {
            TopicFilter::All => true,
            TopicFilter::Prefix(p) => topic.starts_with(p.as_str()),
        }
    }
}

/// Receiving end of a subscription.
///
/// Envelopes arrive in the order the relay published them.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<EventEnvelope>,
}

impl Subscription {
    pub fn new(receiver: Receiver<EventEnvelope>) -> Self {
        Self { receiver }
    }

    pub fn recv(&self) -> Result<EventEnvelope, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<EventEnvelope, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<EventEnvelope, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently queued, without blocking.
    pub fn drain(&self) -> Vec<EventEnvelope> {
        self.receiver.try_iter().collect()
    }
}

/// Transport for committed outbox envelopes.
///
/// `publish` failing leaves the outbox row unpublished; the relay retries it
/// on its next pass.
pub trait EventBus: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error>;

    fn subscribe(&self, filter: TopicFilter) -> Subscription;
}

impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error> {
        (**self).publish(envelope)
    }

    fn subscribe(&self, filter: TopicFilter) -> Subscription {
        (**self).subscribe(filter)
    }
}
