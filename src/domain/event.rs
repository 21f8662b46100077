use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ballot::Rank;
use super::role::Role;

/// The closed set of facts the event log can record. Serialized form carries
/// an explicit `eventType` tag and a `payload`; new variants may be added
/// freely, but an existing variant's payload shape is immutable once shipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "payload")]
pub enum DomainEvent {
    UserRegistered {
        name: String,
        email: String,
        salt: String,
        hash: String,
        /// Present only when the caller explicitly assigned a role (e.g. an
        /// OWNER promoting someone at registration time). Absent means the
        /// command model decides: OWNER for the first registrant, USER
        /// otherwise.
        role: Option<Role>,
    },
    UserRoleChanged {
        name: String,
        role: Role,
    },
    UserPasswordChanged {
        name: String,
        salt: String,
        hash: String,
    },
    UserEmailChanged {
        name: String,
        email: String,
    },
    UserNameChanged {
        old_name: String,
        new_name: String,
    },
    UserRemoved {
        name: String,
    },
    ElectionCreated {
        election_name: String,
        owner_name: String,
    },
    ElectionUpdated {
        election_name: String,
        secret_ballot: Option<bool>,
        allow_vote: Option<bool>,
        allow_edit: Option<bool>,
        /// `None` = unchanged, `Some(None)` = clear, `Some(Some(_))` = set.
        #[serde(default)]
        no_voting_before: Option<Option<DateTime<Utc>>>,
        #[serde(default)]
        no_voting_after: Option<Option<DateTime<Utc>>>,
    },
    ElectionDeleted {
        election_name: String,
    },
    CandidatesAdded {
        election_name: String,
        candidates: Vec<String>,
    },
    CandidatesRemoved {
        election_name: String,
        candidates: Vec<String>,
    },
    VotersAdded {
        election_name: String,
        voters: Vec<String>,
    },
    VotersRemoved {
        election_name: String,
        voters: Vec<String>,
    },
    BallotCast {
        election_name: String,
        voter_name: String,
        confirmation: String,
        rankings: Vec<Rank>,
        when_cast: DateTime<Utc>,
    },
    BallotTimestampUpdated {
        election_name: String,
        voter_name: String,
        when_cast: DateTime<Utc>,
    },
    BallotRankingsChanged {
        election_name: String,
        voter_name: String,
        rankings: Vec<Rank>,
    },
}

impl DomainEvent {
    /// The `eventType` tag this event serializes under. Stable across the
    /// life of a variant; used by backends that store the tag and payload
    /// as separate columns/attributes rather than relying on the serializer.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "UserRegistered",
            Self::UserRoleChanged { .. } => "UserRoleChanged",
            Self::UserPasswordChanged { .. } => "UserPasswordChanged",
            Self::UserEmailChanged { .. } => "UserEmailChanged",
            Self::UserNameChanged { .. } => "UserNameChanged",
            Self::UserRemoved { .. } => "UserRemoved",
            Self::ElectionCreated { .. } => "ElectionCreated",
            Self::ElectionUpdated { .. } => "ElectionUpdated",
            Self::ElectionDeleted { .. } => "ElectionDeleted",
            Self::CandidatesAdded { .. } => "CandidatesAdded",
            Self::CandidatesRemoved { .. } => "CandidatesRemoved",
            Self::VotersAdded { .. } => "VotersAdded",
            Self::VotersRemoved { .. } => "VotersRemoved",
            Self::BallotCast { .. } => "BallotCast",
            Self::BallotTimestampUpdated { .. } => "BallotTimestampUpdated",
            Self::BallotRankingsChanged { .. } => "BallotRankingsChanged",
        }
    }
}

/// A single append-only record in the event log. `event_id` is monotonic and
/// gap-free, starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: u64,
    pub authority: String,
    pub when_occurred: DateTime<Utc>,
    pub event: DomainEvent,
}
