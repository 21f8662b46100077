use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Materialized election state, keyed by the unique `election_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub election_name: String,
    pub owner_name: String,
    pub secret_ballot: bool,
    pub allow_vote: bool,
    pub allow_edit: bool,
    pub no_voting_before: Option<DateTime<Utc>>,
    pub no_voting_after: Option<DateTime<Utc>>,
    /// Whether `launchElection` has ever been called. Distinguishes `draft`
    /// from `finalized`, which otherwise share `allow_vote = allow_edit =
    /// false`.
    pub has_launched: bool,
}

impl Election {
    pub fn new(election_name: String, owner_name: String) -> Self {
        Self {
            election_name,
            owner_name,
            secret_ballot: true,
            allow_vote: false,
            allow_edit: false,
            no_voting_before: None,
            no_voting_after: None,
            has_launched: false,
        }
    }

    /// `draft`: candidates and eligible voters may still be edited.
    pub fn is_draft(&self) -> bool {
        !self.has_launched
    }

    /// `launched`: ballots may be cast, and edited iff `allow_edit`.
    pub fn is_launched(&self) -> bool {
        self.has_launched && self.allow_vote
    }

    /// `finalized`: voting has closed after having been launched.
    pub fn is_finalized(&self) -> bool {
        self.has_launched && !self.allow_vote
    }
}

/// A (election_name, candidate_name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub election_name: String,
    pub candidate_name: String,
}

/// A (election_name, voter_name) pair: `voter_name` must reference an
/// existing [`super::user::User`] at the moment of insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleVoter {
    pub election_name: String,
    pub voter_name: String,
}
