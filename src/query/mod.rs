use rocket::serde::json::Value;
use serde::{Deserialize, Serialize};

use crate::domain::{Ballot, Candidate, Election, Permission, Rank, Role, User};
use crate::error::Result;

/// Identifies who is asking, so that e.g. [`QueryModel::list_ballots`] can
/// decide whether to redact voter identity. `None` means an unauthenticated
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer<'a> {
    pub name: Option<&'a str>,
    pub role: Option<Role>,
}

impl<'a> Viewer<'a> {
    pub fn anonymous() -> Self {
        Self {
            name: None,
            role: None,
        }
    }

    pub fn named(name: &'a str, role: Role) -> Self {
        Self {
            name: Some(name),
            role: Some(role),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role
            .is_some_and(|role| crate::domain::role_has_permission(role, permission))
    }
}

/// A ballot as exposed through the query model. When the owning election is
/// `secret_ballot` and the viewer is neither the ballot's own voter nor the
/// election owner, `voter_name` and `rankings` are redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotView {
    pub election_name: String,
    pub voter_name: Option<String>,
    pub confirmation: String,
    pub when_cast: chrono::DateTime<chrono::Utc>,
    pub rankings: Option<Vec<Rank>>,
}

/// Natural-key, read-only reads over the materialized state. Must return the
/// same result set regardless of backend, given identical event history
/// (excluding secret-ballot masking, which depends on the viewer).
#[rocket::async_trait]
pub trait QueryModel: Send + Sync {
    async fn find_user_by_name(&self, name: &str) -> Result<User>;
    async fn search_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn user_count(&self) -> Result<u64>;

    async fn search_election_by_name(&self, election_name: &str) -> Result<Option<Election>>;
    async fn list_elections(&self) -> Result<Vec<Election>>;
    async fn election_count(&self) -> Result<u64>;

    async fn list_candidates(&self, election_name: &str) -> Result<Vec<Candidate>>;
    async fn candidate_count(&self, election_name: &str) -> Result<u64>;

    async fn list_voters_for_election(&self, election_name: &str) -> Result<Vec<String>>;
    async fn voter_count(&self, election_name: &str) -> Result<u64>;

    async fn search_ballot(
        &self,
        voter_name: &str,
        election_name: &str,
        viewer: Viewer<'_>,
    ) -> Result<Option<BallotView>>;

    /// May mask ranked detail and voter identity depending on the election's
    /// `secret_ballot` flag and the viewer's relationship to each ballot.
    async fn list_ballots(
        &self,
        election_name: &str,
        viewer: Viewer<'_>,
    ) -> Result<Vec<BallotView>>;

    /// The raw, unredacted rankings for one ballot. Callers must have
    /// already authorized the viewer before calling this.
    async fn list_rankings(&self, voter_name: &str, election_name: &str) -> Result<Vec<Rank>>;

    fn role_has_permission(&self, role: Role, permission: Permission) -> bool {
        crate::domain::role_has_permission(role, permission)
    }

    fn list_permissions(&self, role: Role) -> Vec<Permission> {
        crate::domain::list_permissions(role)
    }

    /// Names of the tables/collections the backend exposes, for the admin
    /// raw-storage dump.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// The raw contents of one table/collection, as generic JSON rows, for
    /// the admin raw-storage dump.
    async fn table_data(&self, table_name: &str) -> Result<Vec<Value>>;

    /// The command model's current sync cursor, as observed by the query
    /// side (may run concurrently with writes, so this is a snapshot at or
    /// before the latest `lastSynced`).
    async fn last_synced(&self) -> Result<u64>;

    /// Fetch a ballot's underlying raw entity for use by the tally engine.
    /// Always unredacted; callers must authorize separately.
    async fn raw_ballot(&self, voter_name: &str, election_name: &str) -> Result<Option<Ballot>>;

    /// All raw ballots for an election, unredacted, for tallying.
    async fn raw_ballots(&self, election_name: &str) -> Result<Vec<Ballot>>;
}
