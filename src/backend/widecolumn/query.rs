use mongodb::bson::doc;
use rocket::futures::TryStreamExt;
use rocket::serde::json::{json, Value};

use crate::command::CommandModel;
use crate::domain::{Ballot, Candidate, Election, EligibleVoter, Rank, User};
use crate::error::{Error, Result};
use crate::query::{BallotView, QueryModel, Viewer};

use super::item::{self, Item};
use super::WideColumnBackend;

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

async fn find_items(backend: &WideColumnBackend, filter: mongodb::bson::Document) -> Result<Vec<Item>> {
    let cursor = backend
        .data
        .find(filter, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    cursor
        .try_collect()
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))
}

async fn find_election(backend: &WideColumnBackend, election_name: &str) -> Result<Option<Election>> {
    let filter = doc! {"pk": item::election_pk(election_name), "sk": item::METADATA_SK};
    Ok(backend
        .data
        .find_one(filter, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        .and_then(Item::into_election))
}

async fn find_ballot(backend: &WideColumnBackend, election_name: &str, voter_name: &str) -> Result<Option<Ballot>> {
    let filter = doc! {"pk": item::election_pk(election_name), "sk": item::ballot_sk(voter_name)};
    Ok(backend
        .data
        .find_one(filter, None)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        .and_then(Item::into_ballot))
}

#[rocket::async_trait]
impl QueryModel for WideColumnBackend {
    async fn find_user_by_name(&self, name: &str) -> Result<User> {
        let filter = doc! {"pk": item::user_pk(name), "sk": item::METADATA_SK};
        self.data
            .find_one(filter, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .and_then(Item::into_user)
            .ok_or_else(|| Error::not_found(format!("no user named {name}")))
    }

    async fn search_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let filter = doc! {"itemType": "User", "email": email};
        Ok(self
            .data
            .find_one(filter, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .and_then(Item::into_user))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let items = find_items(self, doc! {"itemType": "User"}).await?;
        let mut users: Vec<User> = items.into_iter().filter_map(Item::into_user).collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn user_count(&self) -> Result<u64> {
        self.data
            .count_documents(doc! {"itemType": "User"}, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn search_election_by_name(&self, election_name: &str) -> Result<Option<Election>> {
        find_election(self, election_name).await
    }

    async fn list_elections(&self) -> Result<Vec<Election>> {
        let items = find_items(self, doc! {"itemType": "Election"}).await?;
        let mut elections: Vec<Election> = items.into_iter().filter_map(Item::into_election).collect();
        elections.sort_by(|a, b| a.election_name.cmp(&b.election_name));
        Ok(elections)
    }

    async fn election_count(&self) -> Result<u64> {
        self.data
            .count_documents(doc! {"itemType": "Election"}, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn list_candidates(&self, election_name: &str) -> Result<Vec<Candidate>> {
        let filter = doc! {"itemType": "Candidate", "election_name": election_name};
        let items = find_items(self, filter).await?;
        Ok(items.into_iter().filter_map(Item::into_candidate).collect())
    }

    async fn candidate_count(&self, election_name: &str) -> Result<u64> {
        let filter = doc! {"itemType": "Candidate", "election_name": election_name};
        self.data
            .count_documents(filter, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn list_voters_for_election(&self, election_name: &str) -> Result<Vec<String>> {
        let filter = doc! {"itemType": "EligibleVoter", "election_name": election_name};
        let items = find_items(self, filter).await?;
        Ok(items
            .into_iter()
            .filter_map(Item::into_eligible_voter)
            .map(|voter: EligibleVoter| voter.voter_name)
            .collect())
    }

    async fn voter_count(&self, election_name: &str) -> Result<u64> {
        let filter = doc! {"itemType": "EligibleVoter", "election_name": election_name};
        self.data
            .count_documents(filter, None)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    async fn search_ballot(
        &self,
        voter_name: &str,
        election_name: &str,
        viewer: Viewer<'_>,
    ) -> Result<Option<BallotView>> {
        let Some(election) = find_election(self, election_name).await? else {
            return Ok(None);
        };
        Ok(find_ballot(self, election_name, voter_name)
            .await?
            .map(|ballot| redact(&ballot, &election, viewer)))
    }

    async fn list_ballots(&self, election_name: &str, viewer: Viewer<'_>) -> Result<Vec<BallotView>> {
        let Some(election) = find_election(self, election_name).await? else {
            return Ok(Vec::new());
        };
        let filter = doc! {"itemType": "Ballot", "election_name": election_name};
        let items = find_items(self, filter).await?;
        let mut views: Vec<BallotView> = items
            .into_iter()
            .filter_map(Item::into_ballot)
            .map(|ballot| redact(&ballot, &election, viewer))
            .collect();
        views.sort_by(|a, b| a.confirmation.cmp(&b.confirmation));
        Ok(views)
    }

    async fn list_rankings(&self, voter_name: &str, election_name: &str) -> Result<Vec<Rank>> {
        Ok(find_ballot(self, election_name, voter_name)
            .await?
            .map(|ballot| ballot.rankings)
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
        let rows = match table_name {
            "users" => find_items(self, doc! {"itemType": "User"})
                .await?
                .into_iter()
                .filter_map(Item::into_user)
                .map(|user| json!(user))
                .collect(),
            "elections" => find_items(self, doc! {"itemType": "Election"})
                .await?
                .into_iter()
                .filter_map(Item::into_election)
                .map(|election| json!(election))
                .collect(),
            "candidates" => find_items(self, doc! {"itemType": "Candidate"})
                .await?
                .into_iter()
                .filter_map(Item::into_candidate)
                .map(|candidate| json!(candidate))
                .collect(),
            "eligible_voters" => find_items(self, doc! {"itemType": "EligibleVoter"})
                .await?
                .into_iter()
                .filter_map(Item::into_eligible_voter)
                .map(|voter| json!(voter))
                .collect(),
            "ballots" => find_items(self, doc! {"itemType": "Ballot"})
                .await?
                .into_iter()
                .filter_map(Item::into_ballot)
                .map(|ballot| json!(ballot))
                .collect(),
            "events" => {
                use crate::event_log::EventLog;
                self.events_after(0)
                    .await?
                    .into_iter()
                    .map(|envelope| json!(envelope))
                    .collect()
            }
            other => return Err(Error::not_found(format!("no such table {other}"))),
        };
        Ok(rows)
    }

    async fn last_synced(&self) -> Result<u64> {
        CommandModel::last_synced(self).await
    }

    async fn raw_ballot(&self, voter_name: &str, election_name: &str) -> Result<Option<Ballot>> {
        find_ballot(self, election_name, voter_name).await
    }

    async fn raw_ballots(&self, election_name: &str) -> Result<Vec<Ballot>> {
        let filter = doc! {"itemType": "Ballot", "election_name": election_name};
        let items = find_items(self, filter).await?;
        Ok(items.into_iter().filter_map(Item::into_ballot).collect())
    }
}
