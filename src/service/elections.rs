use chrono::{DateTime, Utc};

use crate::auth::{require_election_manager, require_permission};
use crate::domain::{Candidate, DomainEvent, Election, Permission};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::query::QueryModel;
use crate::token::Identity;

use super::users::validate_natural_key;
use super::Service;

impl Service {
    pub async fn create_election(&self, caller: &Identity, election_name: &str) -> Result<Election> {
        require_permission(caller, Permission::ManageOwnElection)?;
        validate_natural_key(election_name, "election name")?;
        if self
            .backend
            .search_election_by_name(election_name)
            .await?
            .is_some()
        {
            return Err(Error::conflict(format!(
                "election {election_name} already exists"
            )));
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::ElectionCreated {
                    election_name: election_name.to_string(),
                    owner_name: caller.name.clone(),
                },
            )
            .await?;
        self.synchronize().await;
        self.backend
            .search_election_by_name(election_name)
            .await?
            .ok_or_else(|| Error::Internal("election missing after creation".to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_election(
        &self,
        caller: &Identity,
        election_name: &str,
        secret_ballot: Option<bool>,
        allow_edit: Option<bool>,
        no_voting_before: Option<Option<DateTime<Utc>>>,
        no_voting_after: Option<Option<DateTime<Utc>>>,
    ) -> Result<()> {
        let election = self.require_draft_manageable(caller, election_name).await?;
        let _ = election;
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::ElectionUpdated {
                    election_name: election_name.to_string(),
                    secret_ballot,
                    allow_vote: None,
                    allow_edit,
                    no_voting_before,
                    no_voting_after,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn launch_election(&self, caller: &Identity, election_name: &str, allow_edit: bool) -> Result<()> {
        let election = self.require_draft_manageable(caller, election_name).await?;
        if self.backend.candidate_count(election_name).await? == 0 {
            return Err(Error::precondition("election has no candidates"));
        }
        let _ = election;
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::ElectionUpdated {
                    election_name: election_name.to_string(),
                    secret_ballot: None,
                    allow_vote: Some(true),
                    allow_edit: Some(allow_edit),
                    no_voting_before: None,
                    no_voting_after: None,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn finalize_election(&self, caller: &Identity, election_name: &str) -> Result<()> {
        let election = self.require_manageable(caller, election_name).await?;
        if !election.is_launched() {
            return Err(Error::precondition("election is not launched"));
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::ElectionUpdated {
                    election_name: election_name.to_string(),
                    secret_ballot: None,
                    allow_vote: Some(false),
                    allow_edit: Some(false),
                    no_voting_before: None,
                    no_voting_after: None,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn delete_election(&self, caller: &Identity, election_name: &str) -> Result<()> {
        self.require_manageable(caller, election_name).await?;
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::ElectionDeleted {
                    election_name: election_name.to_string(),
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn add_candidates(&self, caller: &Identity, election_name: &str, names: Vec<String>) -> Result<()> {
        self.require_draft_manageable(caller, election_name).await?;
        for name in &names {
            validate_natural_key(name, "candidate name")?;
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::CandidatesAdded {
                    election_name: election_name.to_string(),
                    candidates: names,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn remove_candidates(&self, caller: &Identity, election_name: &str, names: Vec<String>) -> Result<()> {
        self.require_draft_manageable(caller, election_name).await?;
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::CandidatesRemoved {
                    election_name: election_name.to_string(),
                    candidates: names,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn add_voters(&self, caller: &Identity, election_name: &str, names: Vec<String>) -> Result<()> {
        self.require_draft_manageable(caller, election_name).await?;
        for name in &names {
            self.backend.find_user_by_name(name).await.map_err(|_| {
                Error::validation(format!("{name} is not a registered user"))
            })?;
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::VotersAdded {
                    election_name: election_name.to_string(),
                    voters: names,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn remove_voters(&self, caller: &Identity, election_name: &str, names: Vec<String>) -> Result<()> {
        self.require_draft_manageable(caller, election_name).await?;
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                DomainEvent::VotersRemoved {
                    election_name: election_name.to_string(),
                    voters: names,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn list_elections(&self) -> Result<Vec<Election>> {
        self.backend.list_elections().await
    }

    pub async fn find_election(&self, election_name: &str) -> Result<Election> {
        self.backend
            .search_election_by_name(election_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("no election named {election_name}")))
    }

    pub async fn list_candidates(&self, election_name: &str) -> Result<Vec<Candidate>> {
        self.backend.list_candidates(election_name).await
    }

    pub async fn list_voters(&self, election_name: &str) -> Result<Vec<String>> {
        self.backend.list_voters_for_election(election_name).await
    }

    async fn require_manageable(&self, caller: &Identity, election_name: &str) -> Result<Election> {
        let election = self.find_election(election_name).await?;
        require_election_manager(
            caller,
            &election,
            Permission::ManageOwnElection,
            Permission::ManageAnyElection,
        )?;
        Ok(election)
    }

    async fn require_draft_manageable(&self, caller: &Identity, election_name: &str) -> Result<Election> {
        let election = self.require_manageable(caller, election_name).await?;
        if !election.is_draft() {
            return Err(Error::precondition(format!(
                "election {election_name} is not in draft"
            )));
        }
        Ok(election)
    }
}
