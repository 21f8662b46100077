//! The domain service: the only component that authorizes requests, appends
//! events, and drives synchronization. Every public method follows the same
//! five-step pattern: decode identity (done by the caller via
//! [`crate::token::TokenIssuer`]), authorize, validate against the query
//! model, append, synchronize, and return.

mod ballots;
mod elections;
mod tally;
mod users;

use std::sync::Arc;

use crate::backend::Backend;
use crate::integrations::{Clock, Notifications, PasswordUtil, UniqueIdGenerator};
use crate::token::TokenIssuer;

/// The orchestrator. Holds the storage backend and every injected
/// collaborator; cheap to clone (everything behind an `Arc`).
#[derive(Clone)]
pub struct Service {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) tokens: Arc<dyn TokenIssuer>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn UniqueIdGenerator>,
    pub(crate) passwords: Arc<dyn PasswordUtil>,
    pub(crate) notifications: Arc<dyn Notifications>,
}

impl Service {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn Backend>,
        tokens: Arc<dyn TokenIssuer>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn UniqueIdGenerator>,
        passwords: Arc<dyn PasswordUtil>,
        notifications: Arc<dyn Notifications>,
    ) -> Self {
        Self {
            backend,
            tokens,
            clock,
            ids,
            passwords,
            notifications,
        }
    }

    /// Apply pending events and advance the command model's cursor. Called
    /// after every append on the write path, and safe to call redundantly.
    ///
    /// A failure here does not unwind the caller's request: the event is
    /// already durable in the log and idempotent re-application means the
    /// next `synchronize()` call (including the very next request) will
    /// finish the job. We still surface the failure to the notifications
    /// sink so an operator can see a backend is lagging.
    pub(crate) async fn synchronize(&self) {
        if let Err(e) = crate::command::synchronize(self.backend.as_ref(), self.backend.as_ref()).await
        {
            self.notifications
                .emit_line(&format!("synchronize failed, will retry: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use crate::backend::memory::MemoryBackend;
    use crate::backend::Backend;
    use crate::domain::{Rank, Role};
    use crate::error::Error;
    use crate::integrations::{Argon2PasswordUtil, LogNotifications, SystemClock, UuidGenerator};
    use crate::query::QueryModel;
    use crate::token::{Identity, JwtTokenIssuer};

    use super::Service;

    fn test_service() -> Service {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        Service::new(
            backend,
            Arc::new(JwtTokenIssuer::new(
                b"test".to_vec(),
                Duration::minutes(15),
                Duration::days(7),
            )),
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
            Arc::new(Argon2PasswordUtil),
            Arc::new(LogNotifications),
        )
    }

    fn identity(name: &str, role: Role) -> Identity {
        Identity {
            name: name.to_string(),
            role,
        }
    }

    #[rocket::async_test]
    async fn s1_first_user_becomes_owner() {
        let service = test_service();
        service.register("alice", "alice@example.com", "pw").await.unwrap();

        let users = service.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "alice");
        assert_eq!(users[0].role, Role::Owner);
        assert_eq!(service.backend.user_count().await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn s2_election_lifecycle() {
        let service = test_service();
        service.register("alice", "alice@example.com", "pw").await.unwrap();
        service.register("bob", "bob@example.com", "pw").await.unwrap();
        let alice = identity("alice", Role::Owner);

        service.create_election(&alice, "Best Language").await.unwrap();
        service
            .add_candidates(
                &alice,
                "Best Language",
                vec!["Kotlin".to_string(), "Rust".to_string(), "Go".to_string()],
            )
            .await
            .unwrap();
        service
            .add_voters(&alice, "Best Language", vec!["bob".to_string()])
            .await
            .unwrap();
        service.launch_election(&alice, "Best Language", true).await.unwrap();

        let bob = identity("bob", Role::User);
        service
            .cast_ballot(
                &bob,
                "Best Language",
                vec![
                    Rank { candidate_name: "Kotlin".to_string(), rank: 1 },
                    Rank { candidate_name: "Rust".to_string(), rank: 2 },
                    Rank { candidate_name: "Go".to_string(), rank: 3 },
                ],
            )
            .await
            .unwrap();

        assert!(service
            .search_ballot(&alice, "bob", "Best Language")
            .await
            .unwrap()
            .is_some());
        assert_eq!(service.list_ballots(&alice, "Best Language").await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn s3_condorcet_winner() {
        let service = test_service();
        service.register("alice", "alice@example.com", "pw").await.unwrap();
        let alice = identity("alice", Role::Owner);
        service.create_election(&alice, "e").await.unwrap();
        service
            .add_candidates(
                &alice,
                "e",
                vec!["Apple".to_string(), "Banana".to_string(), "Cherry".to_string()],
            )
            .await
            .unwrap();

        for voter in ["b", "c", "d"] {
            service.register(voter, &format!("{voter}@example.com"), "pw").await.unwrap();
        }
        service
            .add_voters(&alice, "e", vec!["b".to_string(), "c".to_string(), "d".to_string()])
            .await
            .unwrap();
        service.launch_election(&alice, "e", false).await.unwrap();

        let rank = |name: &str, n: u32| Rank {
            candidate_name: name.to_string(),
            rank: n,
        };
        service
            .cast_ballot(&identity("b", Role::User), "e", vec![rank("Apple", 1), rank("Banana", 2), rank("Cherry", 3)])
            .await
            .unwrap();
        service
            .cast_ballot(&identity("c", Role::User), "e", vec![rank("Apple", 1), rank("Cherry", 2), rank("Banana", 3)])
            .await
            .unwrap();
        service
            .cast_ballot(&identity("d", Role::User), "e", vec![rank("Banana", 1), rank("Apple", 2), rank("Cherry", 3)])
            .await
            .unwrap();

        let result = service.tally(&alice, "e").await.unwrap();
        assert_eq!(result.places[0].rank, 1);
        assert_eq!(result.places[0].candidates, vec!["Apple".to_string()]);
    }

    #[rocket::async_test]
    async fn s4_edit_disallowed_leaves_ballot_unchanged() {
        let service = test_service();
        service.register("alice", "alice@example.com", "pw").await.unwrap();
        service.register("bob", "bob@example.com", "pw").await.unwrap();
        let alice = identity("alice", Role::Owner);
        let bob = identity("bob", Role::User);

        service.create_election(&alice, "e").await.unwrap();
        service.add_candidates(&alice, "e", vec!["X".to_string()]).await.unwrap();
        service.add_voters(&alice, "e", vec!["bob".to_string()]).await.unwrap();
        service.launch_election(&alice, "e", false).await.unwrap();

        let first = service
            .cast_ballot(&bob, "e", vec![Rank { candidate_name: "X".to_string(), rank: 1 }])
            .await
            .unwrap();

        let err = service
            .cast_ballot(&bob, "e", vec![Rank { candidate_name: "X".to_string(), rank: 1 }])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed(_)));

        let after = service.backend.raw_ballot("bob", "e").await.unwrap().unwrap();
        assert_eq!(after.confirmation, first.confirmation);
        assert_eq!(after.rankings, first.rankings);
    }

    #[rocket::async_test]
    async fn s6_cascade_delete_leaves_no_orphans() {
        let service = test_service();
        service.register("alice", "alice@example.com", "pw").await.unwrap();
        service.register("bob", "bob@example.com", "pw").await.unwrap();
        let alice = identity("alice", Role::Owner);
        let bob = identity("bob", Role::User);

        service.create_election(&alice, "e").await.unwrap();
        service
            .add_candidates(&alice, "e", vec!["A".to_string(), "B".to_string(), "C".to_string()])
            .await
            .unwrap();
        service.add_voters(&alice, "e", vec!["bob".to_string()]).await.unwrap();
        service.launch_election(&alice, "e", false).await.unwrap();
        service
            .cast_ballot(&bob, "e", vec![Rank { candidate_name: "A".to_string(), rank: 1 }])
            .await
            .unwrap();

        service.delete_election(&alice, "e").await.unwrap();

        assert!(service.list_candidates("e").await.unwrap().is_empty());
        assert!(service.backend.list_ballots("e", crate::query::Viewer::anonymous()).await.unwrap().is_empty());
    }

    /// Runs the same command sequence against two backends and asserts the
    /// query model agrees, per the cross-backend equivalence property.
    #[cfg(feature = "backend_sql")]
    async fn run_equivalence_sequence(service: &Service) {
        service.register("alice", "alice@example.com", "pw").await.unwrap();
        service.register("bob", "bob@example.com", "pw").await.unwrap();
        let alice = identity("alice", Role::Owner);
        let bob = identity("bob", Role::User);

        service.create_election(&alice, "e").await.unwrap();
        service
            .add_candidates(&alice, "e", vec!["A".to_string(), "B".to_string(), "C".to_string()])
            .await
            .unwrap();
        service.add_voters(&alice, "e", vec!["bob".to_string()]).await.unwrap();
        service.launch_election(&alice, "e", false).await.unwrap();
        service
            .cast_ballot(
                &bob,
                "e",
                vec![Rank { candidate_name: "A".to_string(), rank: 1 }, Rank { candidate_name: "B".to_string(), rank: 2 }],
            )
            .await
            .unwrap();
    }

    #[cfg(feature = "backend_sql")]
    fn sql_test_service() -> Service {
        let backend: Arc<dyn Backend> =
            Arc::new(crate::backend::sql::SqlBackend::connect(":memory:").unwrap());
        Service::new(
            backend,
            Arc::new(JwtTokenIssuer::new(
                b"test".to_vec(),
                Duration::minutes(15),
                Duration::days(7),
            )),
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
            Arc::new(Argon2PasswordUtil),
            Arc::new(LogNotifications),
        )
    }

    #[cfg(feature = "backend_sql")]
    #[rocket::async_test]
    async fn s5_cross_backend_equivalence() {
        let memory = test_service();
        let sql = sql_test_service();
        run_equivalence_sequence(&memory).await;
        run_equivalence_sequence(&sql).await;

        assert_eq!(
            memory.backend.user_count().await.unwrap(),
            sql.backend.user_count().await.unwrap()
        );
        assert_eq!(
            memory.backend.election_count().await.unwrap(),
            sql.backend.election_count().await.unwrap()
        );
        let mut memory_candidates: Vec<_> = memory
            .list_candidates("e")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.candidate_name)
            .collect();
        let mut sql_candidates: Vec<_> = sql
            .list_candidates("e")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.candidate_name)
            .collect();
        memory_candidates.sort();
        sql_candidates.sort();
        assert_eq!(memory_candidates, sql_candidates);

        let viewer = identity("alice", Role::Owner);
        let memory_ballots = memory.list_ballots(&viewer, "e").await.unwrap();
        let sql_ballots = sql.list_ballots(&viewer, "e").await.unwrap();
        assert_eq!(memory_ballots.len(), sql_ballots.len());

        let memory_tally = memory.tally(&viewer, "e").await.unwrap();
        let sql_tally = sql.tally(&viewer, "e").await.unwrap();
        assert_eq!(
            memory_tally.places.iter().map(|p| &p.candidates).collect::<Vec<_>>(),
            sql_tally.places.iter().map(|p| &p.candidates).collect::<Vec<_>>()
        );
    }
}
