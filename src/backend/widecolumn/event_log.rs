use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainEvent, EventEnvelope};
use crate::error::{Error, Result};
use crate::event_log::EventLog;

use super::{Counter, WideColumnBackend, EVENT_ID_COUNTER};

/// The on-the-wire shape of one append-only log record, keyed by its
/// monotonic `event_id` so it can double as the mongodb `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDoc {
    #[serde(rename = "_id")]
    pub event_id: i64,
    pub authority: String,
    pub when_occurred: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventDoc {
    fn into_envelope(self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id as u64,
            authority: self.authority,
            when_occurred: self.when_occurred,
            event: self.event,
        }
    }
}

#[rocket::async_trait]
impl EventLog for WideColumnBackend {
    async fn append(&self, authority: &str, when_occurred: DateTime<Utc>, event: DomainEvent) -> Result<u64> {
        let filter = doc! {"_id": EVENT_ID_COUNTER};
        let update = doc! {"$inc": {"next": 1i64}};
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter: Counter = self
            .counters
            .find_one_and_update(filter, update, options)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .ok_or_else(|| Error::Internal("event id counter is missing".to_string()))?;
        let event_id = counter.next;

        let doc = EventDoc {
            event_id,
            authority: authority.to_string(),
            when_occurred,
            event,
        };
        self.events
            .insert_one(doc, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(event_id as u64)
    }

    async fn events_after(&self, cursor: u64) -> Result<Vec<EventEnvelope>> {
        use rocket::futures::TryStreamExt;

        let filter = doc! {"_id": {"$gt": cursor as i64}};
        let find_options = mongodb::options::FindOptions::builder().sort(doc! {"_id": 1}).build();
        let cursor_stream = self
            .events
            .find(filter, find_options)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        let docs: Vec<EventDoc> = cursor_stream
            .try_collect()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(docs.into_iter().map(EventDoc::into_envelope).collect())
    }

    async fn count(&self) -> Result<u64> {
        let count = self
            .events
            .estimated_document_count(None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(count)
    }
}
