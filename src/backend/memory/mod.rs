//! The in-memory backend: maps keyed by natural keys, a single monotonic
//! counter and vector for the log, a mutex around mutation. State is lost on
//! restart; intended for tests and local development.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rocket::serde::json::{json, Value};

use crate::command::CommandModel;
use crate::domain::{Ballot, Candidate, DomainEvent, EligibleVoter, Election, EventEnvelope, Rank, Role, User};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::query::{BallotView, QueryModel, Viewer};

#[derive(Default)]
struct State {
    events: Vec<EventEnvelope>,
    last_synced: u64,
    users: HashMap<String, User>,
    elections: HashMap<String, Election>,
    candidates: HashMap<String, BTreeSet<String>>,
    voters: HashMap<String, BTreeSet<String>>,
    ballots: HashMap<(String, String), Ballot>,
}

/// An in-memory event log, command model, and query model over the same
/// [`State`]. Cheap to construct; every test gets its own.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl EventLog for MemoryBackend {
    async fn append(
        &self,
        authority: &str,
        when_occurred: DateTime<Utc>,
        event: DomainEvent,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let event_id = state.events.len() as u64 + 1;
        state.events.push(EventEnvelope {
            event_id,
            authority: authority.to_string(),
            when_occurred,
            event,
        });
        Ok(event_id)
    }

    async fn events_after(&self, cursor: u64) -> Result<Vec<EventEnvelope>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|envelope| envelope.event_id > cursor)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let state = self.state.lock().unwrap();
        Ok(state.events.len() as u64)
    }
}

#[rocket::async_trait]
impl CommandModel for MemoryBackend {
    async fn last_synced(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().last_synced)
    }

    async fn set_last_synced(&self, event_id: u64) -> Result<()> {
        self.state.lock().unwrap().last_synced = event_id;
        Ok(())
    }

    async fn apply(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if envelope.event_id <= state.last_synced {
            return Ok(());
        }
        apply_event(&mut state, &envelope.event)?;
        state.last_synced = envelope.event_id;
        Ok(())
    }
}

fn apply_event(state: &mut State, event: &DomainEvent) -> Result<()> {
    match event {
        DomainEvent::UserRegistered {
            name,
            email,
            salt,
            hash,
            role,
        } => {
            let role = role.unwrap_or(if state.users.is_empty() {
                Role::Owner
            } else {
                Role::User
            });
            state.users.insert(
                name.clone(),
                User {
                    name: name.clone(),
                    email: email.clone(),
                    salt: salt.clone(),
                    hash: hash.clone(),
                    role,
                },
            );
        }
        DomainEvent::UserRoleChanged { name, role } => {
            if let Some(user) = state.users.get_mut(name) {
                user.role = *role;
            }
        }
        DomainEvent::UserPasswordChanged { name, salt, hash } => {
            if let Some(user) = state.users.get_mut(name) {
                user.salt = salt.clone();
                user.hash = hash.clone();
            }
        }
        DomainEvent::UserEmailChanged { name, email } => {
            if let Some(user) = state.users.get_mut(name) {
                user.email = email.clone();
            }
        }
        DomainEvent::UserNameChanged { old_name, new_name } => {
            if let Some(mut user) = state.users.remove(old_name) {
                user.name = new_name.clone();
                state.users.insert(new_name.clone(), user);
            }
            for election in state.elections.values_mut() {
                if election.owner_name == *old_name {
                    election.owner_name = new_name.clone();
                }
            }
            for voters in state.voters.values_mut() {
                if voters.remove(old_name) {
                    voters.insert(new_name.clone());
                }
            }
            let renamed: Vec<_> = state
                .ballots
                .keys()
                .filter(|(_, voter)| voter == old_name)
                .cloned()
                .collect();
            for key @ (election_name, _) in renamed {
                if let Some(mut ballot) = state.ballots.remove(&key) {
                    ballot.voter_name = new_name.clone();
                    state
                        .ballots
                        .insert((election_name, new_name.clone()), ballot);
                }
            }
        }
        DomainEvent::UserRemoved { name } => {
            state.users.remove(name);
            let owned: Vec<String> = state
                .elections
                .values()
                .filter(|election| election.owner_name == *name)
                .map(|election| election.election_name.clone())
                .collect();
            for election_name in owned {
                delete_election(state, &election_name);
            }
            for voters in state.voters.values_mut() {
                voters.remove(name);
            }
            state.ballots.retain(|(_, voter), _| voter != name);
        }
        DomainEvent::ElectionCreated {
            election_name,
            owner_name,
        } => {
            state.elections.insert(
                election_name.clone(),
                Election::new(election_name.clone(), owner_name.clone()),
            );
            state
                .candidates
                .entry(election_name.clone())
                .or_default();
            state.voters.entry(election_name.clone()).or_default();
        }
        DomainEvent::ElectionUpdated {
            election_name,
            secret_ballot,
            allow_vote,
            allow_edit,
            no_voting_before,
            no_voting_after,
        } => {
            if let Some(election) = state.elections.get_mut(election_name) {
                if let Some(value) = secret_ballot {
                    election.secret_ballot = *value;
                }
                if let Some(value) = allow_vote {
                    if *value {
                        election.has_launched = true;
                    }
                    election.allow_vote = *value;
                }
                if let Some(value) = allow_edit {
                    election.allow_edit = *value;
                }
                if let Some(value) = no_voting_before {
                    election.no_voting_before = *value;
                }
                if let Some(value) = no_voting_after {
                    election.no_voting_after = *value;
                }
            }
        }
        DomainEvent::ElectionDeleted { election_name } => {
            delete_election(state, election_name);
        }
        DomainEvent::CandidatesAdded {
            election_name,
            candidates,
        } => {
            let set = state.candidates.entry(election_name.clone()).or_default();
            for candidate in candidates {
                set.insert(candidate.clone());
            }
        }
        DomainEvent::CandidatesRemoved {
            election_name,
            candidates,
        } => {
            if let Some(set) = state.candidates.get_mut(election_name) {
                for candidate in candidates {
                    set.remove(candidate);
                }
            }
        }
        DomainEvent::VotersAdded {
            election_name,
            voters,
        } => {
            let set = state.voters.entry(election_name.clone()).or_default();
            for voter in voters {
                set.insert(voter.clone());
            }
        }
        DomainEvent::VotersRemoved {
            election_name,
            voters,
        } => {
            if let Some(set) = state.voters.get_mut(election_name) {
                for voter in voters {
                    set.remove(voter);
                }
            }
        }
        DomainEvent::BallotCast {
            election_name,
            voter_name,
            confirmation,
            rankings,
            when_cast,
        } => {
            let key = (election_name.clone(), voter_name.clone());
            let existing_when_cast = state.ballots.get(&key).map(|ballot| ballot.when_cast);
            state.ballots.insert(
                key,
                Ballot {
                    election_name: election_name.clone(),
                    voter_name: voter_name.clone(),
                    confirmation: confirmation.clone(),
                    when_cast: existing_when_cast.unwrap_or(*when_cast),
                    rankings: rankings.clone(),
                },
            );
        }
        DomainEvent::BallotTimestampUpdated {
            election_name,
            voter_name,
            when_cast,
        } => {
            if let Some(ballot) = state
                .ballots
                .get_mut(&(election_name.clone(), voter_name.clone()))
            {
                ballot.when_cast = *when_cast;
            }
        }
        DomainEvent::BallotRankingsChanged {
            election_name,
            voter_name,
            rankings,
        } => {
            if let Some(ballot) = state
                .ballots
                .get_mut(&(election_name.clone(), voter_name.clone()))
            {
                ballot.rankings = rankings.clone();
            }
        }
    }
    Ok(())
}

fn delete_election(state: &mut State, election_name: &str) {
    state.elections.remove(election_name);
    state.candidates.remove(election_name);
    state.voters.remove(election_name);
    state
        .ballots
        .retain(|(owning_election, _), _| owning_election != election_name);
}

fn redact(ballot: &Ballot, election: &Election, viewer: Viewer<'_>) -> BallotView {
    let is_owner_of_ballot = viewer.name == Some(ballot.voter_name.as_str());
    let is_election_owner = viewer.name == Some(election.owner_name.as_str());
    let reveal = !election.secret_ballot
        || is_owner_of_ballot
        || is_election_owner
        || viewer.has_permission(crate::domain::Permission::ViewBallotAny);

    BallotView {
        election_name: ballot.election_name.clone(),
        voter_name: reveal.then(|| ballot.voter_name.clone()),
        confirmation: ballot.confirmation.clone(),
        when_cast: ballot.when_cast,
        rankings: reveal.then(|| ballot.rankings.clone()),
    }
}

#[rocket::async_trait]
impl QueryModel for MemoryBackend {
    async fn find_user_by_name(&self, name: &str) -> Result<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no user named {name}")))
    }

    async fn search_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.state.lock().unwrap().users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn user_count(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().users.len() as u64)
    }

    async fn search_election_by_name(&self, election_name: &str) -> Result<Option<Election>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .elections
            .get(election_name)
            .cloned())
    }

    async fn list_elections(&self) -> Result<Vec<Election>> {
        let mut elections: Vec<Election> = self
            .state
            .lock()
            .unwrap()
            .elections
            .values()
            .cloned()
            .collect();
        elections.sort_by(|a, b| a.election_name.cmp(&b.election_name));
        Ok(elections)
    }

    async fn election_count(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().elections.len() as u64)
    }

    async fn list_candidates(&self, election_name: &str) -> Result<Vec<Candidate>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .candidates
            .get(election_name)
            .into_iter()
            .flatten()
            .map(|candidate_name| Candidate {
                election_name: election_name.to_string(),
                candidate_name: candidate_name.clone(),
            })
            .collect())
    }

    async fn candidate_count(&self, election_name: &str) -> Result<u64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .candidates
            .get(election_name)
            .map(|set| set.len() as u64)
            .unwrap_or(0))
    }

    async fn list_voters_for_election(&self, election_name: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .voters
            .get(election_name)
            .into_iter()
            .flatten()
            .cloned()
            .collect())
    }

    async fn voter_count(&self, election_name: &str) -> Result<u64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .voters
            .get(election_name)
            .map(|set| set.len() as u64)
            .unwrap_or(0))
    }

    async fn search_ballot(
        &self,
        voter_name: &str,
        election_name: &str,
        viewer: Viewer<'_>,
    ) -> Result<Option<BallotView>> {
        let state = self.state.lock().unwrap();
        let Some(election) = state.elections.get(election_name) else {
            return Ok(None);
        };
        Ok(state
            .ballots
            .get(&(election_name.to_string(), voter_name.to_string()))
            .map(|ballot| redact(ballot, election, viewer)))
    }

    async fn list_ballots(
        &self,
        election_name: &str,
        viewer: Viewer<'_>,
    ) -> Result<Vec<BallotView>> {
        let state = self.state.lock().unwrap();
        let Some(election) = state.elections.get(election_name) else {
            return Ok(Vec::new());
        };
        let mut views: Vec<BallotView> = state
            .ballots
            .iter()
            .filter(|((owning_election, _), _)| owning_election == election_name)
            .map(|(_, ballot)| redact(ballot, election, viewer))
            .collect();
        views.sort_by(|a, b| a.confirmation.cmp(&b.confirmation));
        Ok(views)
    }

    async fn list_rankings(&self, voter_name: &str, election_name: &str) -> Result<Vec<Rank>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ballots
            .get(&(election_name.to_string(), voter_name.to_string()))
            .map(|ballot| ballot.rankings.clone())
            .unwrap_or_default())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(vec![
            "users".to_string(),
            "elections".to_string(),
            "candidates".to_string(),
            "eligible_voters".to_string(),
            "ballots".to_string(),
            "events".to_string(),
        ])
    }

    async fn table_data(&self, table_name: &str) -> Result<Vec<Value>> {
        let state = self.state.lock().unwrap();
        let rows = match table_name {
            "users" => state
                .users
                .values()
                .map(|user| json!(user))
                .collect::<Vec<_>>(),
            "elections" => state
                .elections
                .values()
                .map(|election| json!(election))
                .collect(),
            "candidates" => state
                .candidates
                .iter()
                .flat_map(|(election_name, names)| {
                    names.iter().map(move |candidate_name| {
                        json!(Candidate {
                            election_name: election_name.clone(),
                            candidate_name: candidate_name.clone(),
                        })
                    })
                })
                .collect(),
            "eligible_voters" => state
                .voters
                .iter()
                .flat_map(|(election_name, names)| {
                    names.iter().map(move |voter_name| {
                        json!(EligibleVoter {
                            election_name: election_name.clone(),
                            voter_name: voter_name.clone(),
                        })
                    })
                })
                .collect(),
            "ballots" => state
                .ballots
                .values()
                .map(|ballot| json!(ballot))
                .collect(),
            "events" => state
                .events
                .iter()
                .map(|envelope| json!(envelope))
                .collect(),
            other => return Err(Error::not_found(format!("no such table {other}"))),
        };
        Ok(rows)
    }

    async fn last_synced(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().last_synced)
    }

    async fn raw_ballot(&self, voter_name: &str, election_name: &str) -> Result<Option<Ballot>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .ballots
            .get(&(election_name.to_string(), voter_name.to_string()))
            .cloned())
    }

    async fn raw_ballots(&self, election_name: &str) -> Result<Vec<Ballot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ballots
            .iter()
            .filter(|((owning_election, _), _)| owning_election == election_name)
            .map(|(_, ballot)| ballot.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::synchronize;

    async fn register(backend: &MemoryBackend, name: &str) -> u64 {
        backend
            .append(
                "system",
                Utc::now(),
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
        let backend = MemoryBackend::new();
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
        let backend = MemoryBackend::new();
        let a = register(&backend, "alice").await;
        let b = register(&backend, "bob").await;
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(backend.count().await.unwrap(), 2);
    }

    #[rocket::async_test]
    async fn deleting_election_cascades() {
        let backend = MemoryBackend::new();
        register(&backend, "alice").await;
        synchronize(&backend, &backend).await.unwrap();
        backend
            .append(
                "alice",
                Utc::now(),
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
                Utc::now(),
                DomainEvent::CandidatesAdded {
                    election_name: "e".to_string(),
                    candidates: vec!["A".to_string(), "B".to_string()],
                },
            )
            .await
            .unwrap();
        synchronize(&backend, &backend).await.unwrap();
        assert_eq!(backend.list_candidates("e").await.unwrap().len(), 2);

        backend
            .append(
                "alice",
                Utc::now(),
                DomainEvent::ElectionDeleted {
                    election_name: "e".to_string(),
                },
            )
            .await
            .unwrap();
        synchronize(&backend, &backend).await.unwrap();

        assert!(backend.list_candidates("e").await.unwrap().is_empty());
        assert!(backend
            .search_election_by_name("e")
            .await
            .unwrap()
            .is_none());
    }
}
