use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;

use crate::command::CommandModel;
use crate::domain::{DomainEvent, Election, EventEnvelope, Role, User};
use crate::error::{Error, Result};

use super::item::{self, Item};
use super::WideColumnBackend;

#[rocket::async_trait]
impl CommandModel for WideColumnBackend {
    async fn last_synced(&self) -> Result<u64> {
        let filter = doc! {"pk": item::SYNC_PK, "sk": item::SYNC_SK};
        let doc = self
            .data
            .find_one(filter, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(match doc {
            Some(Item::SyncCursor { last_synced, .. }) => last_synced as u64,
            _ => 0,
        })
    }

    async fn set_last_synced(&self, event_id: u64) -> Result<()> {
        let filter = doc! {"pk": item::SYNC_PK, "sk": item::SYNC_SK};
        let replacement = Item::SyncCursor {
            pk: item::SYNC_PK.to_string(),
            sk: item::SYNC_SK.to_string(),
            last_synced: event_id as i64,
        };
        let options = ReplaceOptions::builder().upsert(true).build();
        self.data
            .replace_one(filter, replacement, options)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn apply(&self, envelope: &EventEnvelope) -> Result<()> {
        let current = CommandModel::last_synced(self).await?;
        if envelope.event_id <= current {
            return Ok(());
        }
        apply_event(self, &envelope.event).await?;
        self.set_last_synced(envelope.event_id).await
    }
}

async fn put(backend: &WideColumnBackend, item: Item) -> Result<()> {
    let filter = doc! {"pk": item.pk(), "sk": item.sk()};
    let options = ReplaceOptions::builder().upsert(true).build();
    backend
        .data
        .replace_one(filter, item, options)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    Ok(())
}

async fn delete(backend: &WideColumnBackend, pk: &str, sk: &str) -> Result<()> {
    backend
        .data
        .delete_one(doc! {"pk": pk, "sk": sk}, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    Ok(())
}

async fn get_user(backend: &WideColumnBackend, name: &str) -> Result<Option<User>> {
    let filter = doc! {"pk": item::user_pk(name), "sk": item::METADATA_SK};
    Ok(backend
        .data
        .find_one(filter, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        .and_then(Item::into_user))
}

async fn get_election(backend: &WideColumnBackend, election_name: &str) -> Result<Option<Election>> {
    let filter = doc! {"pk": item::election_pk(election_name), "sk": item::METADATA_SK};
    Ok(backend
        .data
        .find_one(filter, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        .and_then(Item::into_election))
}

async fn apply_event(backend: &WideColumnBackend, event: &DomainEvent) -> Result<()> {
    use rocket::futures::TryStreamExt;

    match event {
        DomainEvent::UserRegistered {
            name,
            email,
            salt,
            hash,
            role,
        } => {
            let count = backend
                .data
                .count_documents(doc! {"itemType": "User"}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let role = role.unwrap_or(if count == 0 { Role::Owner } else { Role::User });
            put(
                backend,
                Item::from_user(&User {
                    name: name.clone(),
                    email: email.clone(),
                    salt: salt.clone(),
                    hash: hash.clone(),
                    role,
                }),
            )
            .await?;
        }
        DomainEvent::UserRoleChanged { name, role } => {
            if let Some(mut user) = get_user(backend, name).await? {
                user.role = *role;
                put(backend, Item::from_user(&user)).await?;
            }
        }
        DomainEvent::UserPasswordChanged { name, salt, hash } => {
            if let Some(mut user) = get_user(backend, name).await? {
                user.salt = salt.clone();
                user.hash = hash.clone();
                put(backend, Item::from_user(&user)).await?;
            }
        }
        DomainEvent::UserEmailChanged { name, email } => {
            if let Some(mut user) = get_user(backend, name).await? {
                user.email = email.clone();
                put(backend, Item::from_user(&user)).await?;
            }
        }
        DomainEvent::UserNameChanged { old_name, new_name } => {
            if let Some(mut user) = get_user(backend, old_name).await? {
                user.name = new_name.clone();
                delete(backend, &item::user_pk(old_name), item::METADATA_SK).await?;
                put(backend, Item::from_user(&user)).await?;
            }

            let cursor = backend
                .data
                .find(doc! {"itemType": "Election", "owner_name": old_name}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let owned: Vec<Item> = cursor.try_collect().await.map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            for item in owned {
                if let Some(mut election) = item.into_election() {
                    election.owner_name = new_name.clone();
                    put(backend, Item::from_election(&election)).await?;
                }
            }

            let cursor = backend
                .data
                .find(doc! {"itemType": "EligibleVoter", "voter_name": old_name}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let voters: Vec<Item> = cursor.try_collect().await.map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            for item in voters {
                if let Some(voter) = item.clone().into_eligible_voter() {
                    delete(backend, &item::election_pk(&voter.election_name), &item::voter_sk(old_name)).await?;
                    put(
                        backend,
                        Item::from_eligible_voter(&crate::domain::EligibleVoter {
                            election_name: voter.election_name,
                            voter_name: new_name.clone(),
                        }),
                    )
                    .await?;
                }
            }

            let cursor = backend
                .data
                .find(doc! {"itemType": "Ballot", "voter_name": old_name}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let ballots: Vec<Item> = cursor.try_collect().await.map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            for item in ballots {
                if let Some(mut ballot) = item.clone().into_ballot() {
                    delete(backend, &item::election_pk(&ballot.election_name), &item::ballot_sk(old_name)).await?;
                    ballot.voter_name = new_name.clone();
                    put(backend, Item::from_ballot(&ballot)).await?;
                }
            }
        }
        DomainEvent::UserRemoved { name } => {
            let cursor = backend
                .data
                .find(doc! {"itemType": "Election", "owner_name": name}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let owned: Vec<Item> = cursor.try_collect().await.map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            for item in owned {
                if let Some(election) = item.into_election() {
                    delete_election(backend, &election.election_name).await?;
                }
            }
            backend
                .data
                .delete_many(doc! {"itemType": "EligibleVoter", "voter_name": name}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            backend
                .data
                .delete_many(doc! {"itemType": "Ballot", "voter_name": name}, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            delete(backend, &item::user_pk(name), item::METADATA_SK).await?;
        }
        DomainEvent::ElectionCreated {
            election_name,
            owner_name,
        } => {
            put(
                backend,
                Item::from_election(&Election::new(election_name.clone(), owner_name.clone())),
            )
            .await?;
        }
        DomainEvent::ElectionUpdated {
            election_name,
            secret_ballot,
            allow_vote,
            allow_edit,
            no_voting_before,
            no_voting_after,
        } => {
            if let Some(mut election) = get_election(backend, election_name).await? {
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
                put(backend, Item::from_election(&election)).await?;
            }
        }
        DomainEvent::ElectionDeleted { election_name } => {
            delete_election(backend, election_name).await?;
        }
        DomainEvent::CandidatesAdded {
            election_name,
            candidates,
        } => {
            for candidate_name in candidates {
                put(
                    backend,
                    Item::from_candidate(&crate::domain::Candidate {
                        election_name: election_name.clone(),
                        candidate_name: candidate_name.clone(),
                    }),
                )
                .await?;
            }
        }
        DomainEvent::CandidatesRemoved {
            election_name,
            candidates,
        } => {
            for candidate_name in candidates {
                delete(backend, &item::election_pk(election_name), &item::candidate_sk(candidate_name)).await?;
            }
        }
        DomainEvent::VotersAdded {
            election_name,
            voters,
        } => {
            for voter_name in voters {
                put(
                    backend,
                    Item::from_eligible_voter(&crate::domain::EligibleVoter {
                        election_name: election_name.clone(),
                        voter_name: voter_name.clone(),
                    }),
                )
                .await?;
            }
        }
        DomainEvent::VotersRemoved {
            election_name,
            voters,
        } => {
            for voter_name in voters {
                delete(backend, &item::election_pk(election_name), &item::voter_sk(voter_name)).await?;
            }
        }
        DomainEvent::BallotCast {
            election_name,
            voter_name,
            confirmation,
            rankings,
            when_cast,
        } => {
            let filter = doc! {"pk": item::election_pk(election_name), "sk": item::ballot_sk(voter_name)};
            let existing = backend
                .data
                .find_one(filter, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .and_then(Item::into_ballot);
            let when_cast = existing.map(|ballot| ballot.when_cast).unwrap_or(*when_cast);
            put(
                backend,
                Item::from_ballot(&crate::domain::Ballot {
                    election_name: election_name.clone(),
                    voter_name: voter_name.clone(),
                    confirmation: confirmation.clone(),
                    when_cast,
                    rankings: rankings.clone(),
                }),
            )
            .await?;
        }
        DomainEvent::BallotTimestampUpdated {
            election_name,
            voter_name,
            when_cast,
        } => {
            let filter = doc! {"pk": item::election_pk(election_name), "sk": item::ballot_sk(voter_name)};
            if let Some(mut ballot) = backend
                .data
                .find_one(filter, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .and_then(Item::into_ballot)
            {
                ballot.when_cast = *when_cast;
                put(backend, Item::from_ballot(&ballot)).await?;
            }
        }
        DomainEvent::BallotRankingsChanged {
            election_name,
            voter_name,
            rankings,
        } => {
            let filter = doc! {"pk": item::election_pk(election_name), "sk": item::ballot_sk(voter_name)};
            if let Some(mut ballot) = backend
                .data
                .find_one(filter, None)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .and_then(Item::into_ballot)
            {
                ballot.rankings = rankings.clone();
                put(backend, Item::from_ballot(&ballot)).await?;
            }
        }
    }
    Ok(())
}

async fn delete_election(backend: &WideColumnBackend, election_name: &str) -> Result<()> {
    backend
        .data
        .delete_many(doc! {"pk": item::election_pk(election_name)}, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    Ok(())
}
