//! The single-table item shape stored in the wide-column backend's `data`
//! collection. Every entity is keyed by a `(pk, sk)` pair so that all facts
//! about one election live under the same partition, grounded on the
//! teacher's `Coll<T>`/natural-key-collection pattern generalized from "one
//! collection per entity" to "one collection, many item kinds".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Ballot, Candidate, EligibleVoter, Election, Rank, Role, User};

pub fn user_pk(name: &str) -> String {
    format!("USER#{name}")
}

pub fn election_pk(election_name: &str) -> String {
    format!("ELECTION#{election_name}")
}

pub const METADATA_SK: &str = "METADATA";

pub fn candidate_sk(candidate_name: &str) -> String {
    format!("CANDIDATE#{candidate_name}")
}

pub fn voter_sk(voter_name: &str) -> String {
    format!("ELIGIBLE#{voter_name}")
}

pub fn ballot_sk(voter_name: &str) -> String {
    format!("BALLOT#{voter_name}")
}

pub const SYNC_PK: &str = "SYNC";
pub const SYNC_SK: &str = "CURSOR";

/// The discriminated union of everything that can live in the `data`
/// collection, tagged by `itemType` the same way [`crate::domain::DomainEvent`]
/// is tagged by `eventType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "itemType")]
pub enum Item {
    User {
        pk: String,
        sk: String,
        name: String,
        email: String,
        salt: String,
        hash: String,
        role: Role,
    },
    Election {
        pk: String,
        sk: String,
        election_name: String,
        owner_name: String,
        secret_ballot: bool,
        allow_vote: bool,
        allow_edit: bool,
        no_voting_before: Option<DateTime<Utc>>,
        no_voting_after: Option<DateTime<Utc>>,
        has_launched: bool,
    },
    Candidate {
        pk: String,
        sk: String,
        election_name: String,
        candidate_name: String,
    },
    EligibleVoter {
        pk: String,
        sk: String,
        election_name: String,
        voter_name: String,
    },
    Ballot {
        pk: String,
        sk: String,
        election_name: String,
        voter_name: String,
        confirmation: String,
        when_cast: DateTime<Utc>,
        rankings: Vec<Rank>,
    },
    SyncCursor {
        pk: String,
        sk: String,
        last_synced: i64,
    },
}

impl Item {
    pub fn pk(&self) -> &str {
        match self {
            Item::User { pk, .. }
            | Item::Election { pk, .. }
            | Item::Candidate { pk, .. }
            | Item::EligibleVoter { pk, .. }
            | Item::Ballot { pk, .. }
            | Item::SyncCursor { pk, .. } => pk,
        }
    }

    pub fn sk(&self) -> &str {
        match self {
            Item::User { sk, .. }
            | Item::Election { sk, .. }
            | Item::Candidate { sk, .. }
            | Item::EligibleVoter { sk, .. }
            | Item::Ballot { sk, .. }
            | Item::SyncCursor { sk, .. } => sk,
        }
    }

    pub fn from_user(user: &User) -> Self {
        Item::User {
            pk: user_pk(&user.name),
            sk: METADATA_SK.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            salt: user.salt.clone(),
            hash: user.hash.clone(),
            role: user.role,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Item::User {
                name,
                email,
                salt,
                hash,
                role,
                ..
            } => Some(User {
                name,
                email,
                salt,
                hash,
                role,
            }),
            _ => None,
        }
    }

    pub fn from_election(election: &Election) -> Self {
        Item::Election {
            pk: election_pk(&election.election_name),
            sk: METADATA_SK.to_string(),
            election_name: election.election_name.clone(),
            owner_name: election.owner_name.clone(),
            secret_ballot: election.secret_ballot,
            allow_vote: election.allow_vote,
            allow_edit: election.allow_edit,
            no_voting_before: election.no_voting_before,
            no_voting_after: election.no_voting_after,
            has_launched: election.has_launched,
        }
    }

    pub fn into_election(self) -> Option<Election> {
        match self {
            Item::Election {
                election_name,
                owner_name,
                secret_ballot,
                allow_vote,
                allow_edit,
                no_voting_before,
                no_voting_after,
                has_launched,
                ..
            } => Some(Election {
                election_name,
                owner_name,
                secret_ballot,
                allow_vote,
                allow_edit,
                no_voting_before,
                no_voting_after,
                has_launched,
            }),
            _ => None,
        }
    }

    pub fn from_candidate(candidate: &Candidate) -> Self {
        Item::Candidate {
            pk: election_pk(&candidate.election_name),
            sk: candidate_sk(&candidate.candidate_name),
            election_name: candidate.election_name.clone(),
            candidate_name: candidate.candidate_name.clone(),
        }
    }

    pub fn into_candidate(self) -> Option<Candidate> {
        match self {
            Item::Candidate {
                election_name,
                candidate_name,
                ..
            } => Some(Candidate {
                election_name,
                candidate_name,
            }),
            _ => None,
        }
    }

    pub fn from_eligible_voter(voter: &EligibleVoter) -> Self {
        Item::EligibleVoter {
            pk: election_pk(&voter.election_name),
            sk: voter_sk(&voter.voter_name),
            election_name: voter.election_name.clone(),
            voter_name: voter.voter_name.clone(),
        }
    }

    pub fn into_eligible_voter(self) -> Option<EligibleVoter> {
        match self {
            Item::EligibleVoter {
                election_name,
                voter_name,
                ..
            } => Some(EligibleVoter {
                election_name,
                voter_name,
            }),
            _ => None,
        }
    }

    pub fn from_ballot(ballot: &Ballot) -> Self {
        Item::Ballot {
            pk: election_pk(&ballot.election_name),
            sk: ballot_sk(&ballot.voter_name),
            election_name: ballot.election_name.clone(),
            voter_name: ballot.voter_name.clone(),
            confirmation: ballot.confirmation.clone(),
            when_cast: ballot.when_cast,
            rankings: ballot.rankings.clone(),
        }
    }

    pub fn into_ballot(self) -> Option<Ballot> {
        match self {
            Item::Ballot {
                election_name,
                voter_name,
                confirmation,
                when_cast,
                rankings,
                ..
            } => Some(Ballot {
                election_name,
                voter_name,
                confirmation,
                when_cast,
                rankings,
            }),
            _ => None,
        }
    }
}
