use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use neoledger_core::{LedgerError, LedgerResult};

use crate::event::Event;

/// Serialized event as stored in the outbox and delivered on the bus.
///
/// Delivery is at-least-once; consumers dedupe on `event_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    topic: String,
    version: u32,
    aggregate_id: Uuid,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(
        event_id: Uuid,
        topic: impl Into<String>,
        version: u32,
        aggregate_id: Uuid,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            topic: topic.into(),
            version,
            aggregate_id,
            occurred_at,
            payload,
        }
    }

    /// Wrap a typed event, assigning a fresh time-ordered id.
    pub fn wrap<E: Event>(event: &E) -> LedgerResult<Self> {
        let payload = serde_json::to_value(event)
            .map_err(|e| LedgerError::internal("serialize_event", e))?;
        Ok(Self::new(
            Uuid::now_v7(),
            event.topic(),
            event.version(),
            event.aggregate_id(),
            event.occurred_at(),
            payload,
        ))
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    struct Pinged {
        wallet_id: Uuid,
        at: DateTime<Utc>,
    }

    impl Event for Pinged {
        fn topic(&self) -> &'static str {
            "wallet.pinged"
        }

        fn aggregate_id(&self) -> Uuid {
            self.wallet_id
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn wrap_copies_routing_fields_and_payload() {
        let event = Pinged {
            wallet_id: Uuid::now_v7(),
            at: Utc::now(),
        };
        let env = EventEnvelope::wrap(&event).unwrap();
        assert_eq!(env.topic(), "wallet.pinged");
        assert_eq!(env.version(), 1);
        assert_eq!(env.aggregate_id(), event.wallet_id);
        assert_eq!(env.payload()["wallet_id"], serde_json::json!(event.wallet_id));
    }
}
