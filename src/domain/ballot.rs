use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single ranked preference: `candidate_name` at the given `rank`. Lower
/// rank is a stronger preference. Ranks are positive; ties are permitted but
/// a candidate may appear at most once per ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub candidate_name: String,
    pub rank: u32,
}

/// Materialized ballot state, keyed by `(election_name, voter_name)`.
/// `confirmation` is an opaque identifier assigned at first cast and
/// preserved across edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub election_name: String,
    pub voter_name: String,
    pub confirmation: String,
    pub when_cast: DateTime<Utc>,
    pub rankings: Vec<Rank>,
}
