use crate::domain::EventEnvelope;
use crate::error::Result;
use crate::event_log::EventLog;

/// The write-side projection: applies committed events to materialized
/// state. Implementations must make every variant's effect an absolute
/// assignment or set operation (never a delta), so that applying the same
/// event twice leaves the same state as applying it once.
#[rocket::async_trait]
pub trait CommandModel: Send + Sync {
    /// The highest `event_id` applied so far, or 0 if none.
    async fn last_synced(&self) -> Result<u64>;

    /// Advance the cursor. Callers must invoke this only after the event's
    /// effect is durably stored, and only with a strictly increasing id.
    async fn set_last_synced(&self, event_id: u64) -> Result<()>;

    /// Apply one event's effect to the materialized state. Must succeed or
    /// fail as a single unit: no partial application of one event may
    /// persist.
    async fn apply(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// Read all events after the command model's cursor from `log` and apply
/// them in order, advancing the cursor after each successful apply. If an
/// apply fails partway through a batch, the cursor is left at the last
/// successfully applied id, and a later call resumes from there.
pub async fn synchronize(log: &dyn EventLog, command: &dyn CommandModel) -> Result<()> {
    let cursor = command.last_synced().await?;
    let pending = log.events_after(cursor).await?;
    for envelope in pending {
        if envelope.event_id <= cursor {
            // Already applied; idempotence guards against re-application.
            continue;
        }
        command.apply(&envelope).await?;
        let advanced = command.last_synced().await?;
        if advanced < envelope.event_id {
            command.set_last_synced(envelope.event_id).await?;
        } else if advanced > envelope.event_id {
            return Err(crate::error::Error::Internal(
                "sync cursor moved backward".to_string(),
            ));
        }
    }
    Ok(())
}
