//! The wide-column backend: a single `data` collection holding every entity
//! as a `(pk, sk)`-keyed [`item::Item`], plus an append-only `events`
//! collection and a `counters` collection used to mint gap-free event ids.
//! Grounded on the teacher's `Coll<T>`/`Counter`/`ensure_indexes_exist`
//! pattern in `model/mongodb`, generalized from one collection per entity to
//! one collection for the whole keyspace.

mod command;
mod event_log;
mod item;
mod query;

use mongodb::{
    bson::doc,
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use item::Item;

/// A counter document used to mint monotonic, gap-free event ids, mirroring
/// the teacher's election/ballot id counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Counter {
    #[serde(rename = "_id")]
    id: String,
    next: i64,
}

const EVENT_ID_COUNTER: &str = "event_id";

pub struct WideColumnBackend {
    data: Collection<Item>,
    events: Collection<event_log::EventDoc>,
    counters: Collection<Counter>,
}

impl WideColumnBackend {
    /// Connect to `uri`, select database `database`, ensure the unique
    /// `(pk, sk)` index and the event id counter both exist, and return a
    /// ready-to-use backend. Idempotent: safe to call against a database
    /// that has already been initialised.
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|e| Error::StorageUnavailable(format!("invalid mongodb uri: {e}")))?;
        let client = Client::with_options(options)
            .map_err(|e| Error::StorageUnavailable(format!("failed to construct mongodb client: {e}")))?;
        let db: Database = client.database(database);

        let backend = Self {
            data: db.collection("data"),
            events: db.collection("events"),
            counters: db.collection("counters"),
        };
        backend.ensure_indexes_exist().await?;
        Ok(backend)
    }

    async fn ensure_indexes_exist(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();
        let pk_sk_index = IndexModel::builder()
            .keys(doc! {"pk": 1, "sk": 1})
            .options(unique)
            .build();
        self.data
            .create_index(pk_sk_index, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let filter = doc! {"_id": EVENT_ID_COUNTER};
        let update = doc! {"$setOnInsert": {"_id": EVENT_ID_COUNTER, "next": 1i64}};
        let options = mongodb::options::UpdateOptions::builder().upsert(true).build();
        self.counters
            .update_one(filter, update, options)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}

/// These exercise a real mongod, unlike the memory and sql backends' tests.
/// Point `CONDORCET_TEST_MONGO_URI` at a scratch instance to run them; they
/// no-op otherwise rather than failing a build without mongo available.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::synchronize;
    use crate::domain::{DomainEvent, Role};
    use crate::event_log::EventLog;
    use crate::query::QueryModel;

    async fn test_backend() -> Option<WideColumnBackend> {
        let uri = std::env::var("CONDORCET_TEST_MONGO_URI").ok()?;
        let database = format!("condorcet_test_{}", std::process::id());
        Some(
            WideColumnBackend::connect(&uri, &database)
                .await
                .expect("failed to connect to test mongo instance"),
        )
    }

    async fn register(backend: &WideColumnBackend, name: &str) -> u64 {
        backend
            .append(
                "system",
                chrono::Utc::now(),
                DomainEvent::UserRegistered {
                    name: name.to_string(),
                    email: format!("{name}@example.com"),
                    salt: "s".to_string(),
                    hash: "h".to_string(),
                    role: None,
                },
            )
            .await
            .unwrap()
    }

    #[rocket::async_test]
    async fn first_registrant_becomes_owner() {
        let Some(backend) = test_backend().await else {
            return;
        };
        register(&backend, "alice").await;
        synchronize(&backend, &backend).await.unwrap();
        register(&backend, "bob").await;
        synchronize(&backend, &backend).await.unwrap();

        let alice = backend.find_user_by_name("alice").await.unwrap();
        let bob = backend.find_user_by_name("bob").await.unwrap();
        assert_eq!(alice.role, Role::Owner);
        assert_eq!(bob.role, Role::User);
    }

    #[rocket::async_test]
    async fn event_ids_are_gap_free_and_monotonic() {
        let Some(backend) = test_backend().await else {
            return;
        };
        let a = register(&backend, "alice").await;
        let b = register(&backend, "bob").await;
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(backend.count().await.unwrap(), 2);
    }

    #[rocket::async_test]
    async fn deleting_election_cascades() {
        let Some(backend) = test_backend().await else {
            return;
        };
        register(&backend, "alice").await;
        synchronize(&backend, &backend).await.unwrap();
        backend
            .append(
                "alice",
                chrono::Utc::now(),
                DomainEvent::ElectionCreated {
                    election_name: "e".to_string(),
                    owner_name: "alice".to_string(),
                },
            )
            .await
            .unwrap();
        backend
            .append(
                "alice",
                chrono::Utc::now(),
                DomainEvent::CandidatesAdded {
                    election_name: "e".to_string(),
                    candidates: vec!["x".to_string()],
                },
            )
            .await
            .unwrap();
        backend
            .append(
                "alice",
                chrono::Utc::now(),
                DomainEvent::ElectionDeleted {
                    election_name: "e".to_string(),
                },
            )
            .await
            .unwrap();
        synchronize(&backend, &backend).await.unwrap();

        assert_eq!(backend.candidate_count("e").await.unwrap(), 0);
        assert!(backend.search_election_by_name("e").await.unwrap().is_none());
    }
}
