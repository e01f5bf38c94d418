use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A fact about a committed ledger or wallet change.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - keyed by the aggregate they describe (an entry or a wallet)
pub trait Event: Clone + core::fmt::Debug + Serialize + Send + Sync + 'static {
    /// Outbox topic (e.g. "wallet.transfer.completed").
    fn topic(&self) -> &'static str;

    /// Schema version for this topic.
    fn version(&self) -> u32 {
        1
    }

    /// Entry or wallet the event is about.
    fn aggregate_id(&self) -> Uuid;

    /// When the change committed (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
