use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;

use crate::domain::{Ballot, Candidate, DomainEvent, EligibleVoter, Election, EventEnvelope, Rank, Role, User};
use crate::error::{Error, Result};

use super::schema::{ballots, candidates, eligible_voters, elections, events, sync_state, users};

fn to_naive(at: DateTime<Utc>) -> NaiveDateTime {
    at.naive_utc()
}

fn from_naive(at: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(at, Utc)
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub name: String,
    pub email: String,
    pub salt: String,
    pub hash: String,
    pub role: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            name: row.name,
            email: row.email,
            salt: row.salt,
            hash: row.hash,
            role: role_from_str(&row.role),
        }
    }
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        UserRow {
            name: user.name.clone(),
            email: user.email.clone(),
            salt: user.salt.clone(),
            hash: user.hash.clone(),
            role: role_to_str(user.role).to_string(),
        }
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Owner => "OWNER",
        Role::Admin => "ADMIN",
        Role::User => "USER",
    }
}

fn role_from_str(role: &str) -> Role {
    match role {
        "OWNER" => Role::Owner,
        "ADMIN" => Role::Admin,
        _ => Role::User,
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = elections)]
pub struct ElectionRow {
    pub election_name: String,
    pub owner_name: String,
    pub secret_ballot: bool,
    pub allow_vote: bool,
    pub allow_edit: bool,
    pub no_voting_before: Option<NaiveDateTime>,
    pub no_voting_after: Option<NaiveDateTime>,
    pub has_launched: bool,
}

impl From<ElectionRow> for Election {
    fn from(row: ElectionRow) -> Self {
        Election {
            election_name: row.election_name,
            owner_name: row.owner_name,
            secret_ballot: row.secret_ballot,
            allow_vote: row.allow_vote,
            allow_edit: row.allow_edit,
            no_voting_before: row.no_voting_before.map(from_naive),
            no_voting_after: row.no_voting_after.map(from_naive),
            has_launched: row.has_launched,
        }
    }
}

impl From<&Election> for ElectionRow {
    fn from(election: &Election) -> Self {
        ElectionRow {
            election_name: election.election_name.clone(),
            owner_name: election.owner_name.clone(),
            secret_ballot: election.secret_ballot,
            allow_vote: election.allow_vote,
            allow_edit: election.allow_edit,
            no_voting_before: election.no_voting_before.map(to_naive),
            no_voting_after: election.no_voting_after.map(to_naive),
            has_launched: election.has_launched,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = candidates)]
pub struct CandidateRow {
    pub election_name: String,
    pub candidate_name: String,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            election_name: row.election_name,
            candidate_name: row.candidate_name,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = eligible_voters)]
pub struct EligibleVoterRow {
    pub election_name: String,
    pub voter_name: String,
}

impl From<EligibleVoterRow> for EligibleVoter {
    fn from(row: EligibleVoterRow) -> Self {
        EligibleVoter {
            election_name: row.election_name,
            voter_name: row.voter_name,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = ballots)]
pub struct BallotRow {
    pub election_name: String,
    pub voter_name: String,
    pub confirmation: String,
    pub when_cast: NaiveDateTime,
    pub rankings: String,
}

impl BallotRow {
    pub fn from_domain(ballot: &Ballot) -> Result<Self> {
        Ok(BallotRow {
            election_name: ballot.election_name.clone(),
            voter_name: ballot.voter_name.clone(),
            confirmation: ballot.confirmation.clone(),
            when_cast: to_naive(ballot.when_cast),
            rankings: rocket::serde::json::serde_json::to_string(&ballot.rankings)
                .map_err(|e| Error::Internal(format!("failed to serialize rankings: {e}")))?,
        })
    }

    pub fn into_domain(self) -> Result<Ballot> {
        let rankings: Vec<Rank> = rocket::serde::json::serde_json::from_str(&self.rankings)
            .map_err(|e| Error::Internal(format!("failed to deserialize rankings: {e}")))?;
        Ok(Ballot {
            election_name: self.election_name,
            voter_name: self.voter_name,
            confirmation: self.confirmation,
            when_cast: from_naive(self.when_cast),
            rankings,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = events)]
pub struct NewEventRow {
    pub authority: String,
    pub when_occurred: NaiveDateTime,
    pub event_type: String,
    pub payload: String,
}

impl NewEventRow {
    pub fn from_domain(authority: &str, when_occurred: DateTime<Utc>, event: &DomainEvent) -> Result<Self> {
        Ok(NewEventRow {
            authority: authority.to_string(),
            when_occurred: to_naive(when_occurred),
            event_type: event.type_tag().to_string(),
            payload: rocket::serde::json::serde_json::to_string(event)
                .map_err(|e| Error::Internal(format!("failed to serialize event: {e}")))?,
        })
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct EventRow {
    pub event_id: i64,
    pub authority: String,
    pub when_occurred: NaiveDateTime,
    #[allow(dead_code)]
    pub event_type: String,
    pub payload: String,
}

impl EventRow {
    pub fn into_envelope(self) -> Result<EventEnvelope> {
        let event: DomainEvent = rocket::serde::json::serde_json::from_str(&self.payload)
            .map_err(|e| Error::Internal(format!("failed to deserialize event {}: {e}", self.event_id)))?;
        Ok(EventEnvelope {
            event_id: self.event_id as u64,
            authority: self.authority,
            when_occurred: from_naive(self.when_occurred),
            event,
        })
    }
}

#[derive(Debug, Clone, Queryable, AsChangeset)]
#[diesel(table_name = sync_state)]
pub struct SyncStateRow {
    pub id: i32,
    pub last_synced: i64,
}
