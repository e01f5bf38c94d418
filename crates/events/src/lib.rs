//! Integration events emitted by the ledger and wallet engines.
//!
//! Events are written to the outbox in the same transaction as the change they
//! describe and relayed to an [`EventBus`] after commit.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription, TopicFilter};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
