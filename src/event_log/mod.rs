use chrono::{DateTime, Utc};

use crate::domain::{DomainEvent, EventEnvelope};
use crate::error::Result;

/// The append-only, totally ordered source of truth. Implementations must
/// serialize id assignment so that no two appends ever receive the same
/// `event_id`, and must never mutate or delete a record once it is visible
/// to readers.
#[rocket::async_trait]
pub trait EventLog: Send + Sync {
    /// Atomically assign the next monotonically increasing `event_id`
    /// (starting at 1), persist the envelope, and return the id. A partial
    /// write (envelope persisted without the id commit) must never be
    /// visible to [`EventLog::events_after`].
    async fn append(
        &self,
        authority: &str,
        when_occurred: DateTime<Utc>,
        event: DomainEvent,
    ) -> Result<u64>;

    /// All envelopes with `event_id > cursor`, in strictly ascending
    /// `event_id` order. Finite and not restartable within a single call.
    async fn events_after(&self, cursor: u64) -> Result<Vec<EventEnvelope>>;

    /// Total number of events ever persisted.
    async fn count(&self) -> Result<u64>;
}
