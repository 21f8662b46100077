use std::collections::HashSet;

use crate::auth::require_permission;
use crate::domain::{Ballot, DomainEvent, Permission, Rank};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::query::{BallotView, QueryModel, Viewer};
use crate::token::Identity;

use super::Service;

impl Service {
    /// Cast or edit the caller's ballot in one election. A second call for
    /// the same voter is an edit, permitted only while the election's
    /// `allow_edit` flag is set; the original `confirmation` is preserved.
    pub async fn cast_ballot(
        &self,
        caller: &Identity,
        election_name: &str,
        rankings: Vec<Rank>,
    ) -> Result<Ballot> {
        require_permission(caller, Permission::Vote)?;
        let election = self.find_election(election_name).await?;
        if !election.is_launched() {
            return Err(Error::precondition(format!(
                "election {election_name} is not accepting ballots"
            )));
        }
        let voters = self.backend.list_voters_for_election(election_name).await?;
        if !voters.iter().any(|v| v == &caller.name) {
            return Err(Error::forbidden(format!(
                "{} is not an eligible voter for {election_name}",
                caller.name
            )));
        }

        let candidates: HashSet<String> = self
            .backend
            .list_candidates(election_name)
            .await?
            .into_iter()
            .map(|c| c.candidate_name)
            .collect();
        validate_rankings(&rankings, &candidates)?;

        let existing = self.backend.raw_ballot(&caller.name, election_name).await?;
        let now = self.clock.now();
        match existing {
            Some(ballot) if !election.allow_edit => {
                let _ = ballot;
                return Err(Error::precondition("editing ballots is not permitted for this election"));
            }
            Some(_) => {
                self.backend
                    .append(
                        &caller.name,
                        now,
                        DomainEvent::BallotRankingsChanged {
                            election_name: election_name.to_string(),
                            voter_name: caller.name.clone(),
                            rankings,
                        },
                    )
                    .await?;
                self.backend
                    .append(
                        &caller.name,
                        now,
                        DomainEvent::BallotTimestampUpdated {
                            election_name: election_name.to_string(),
                            voter_name: caller.name.clone(),
                            when_cast: now,
                        },
                    )
                    .await?;
            }
            None => {
                let confirmation = self.ids.generate();
                self.backend
                    .append(
                        &caller.name,
                        now,
                        DomainEvent::BallotCast {
                            election_name: election_name.to_string(),
                            voter_name: caller.name.clone(),
                            confirmation,
                            rankings,
                            when_cast: now,
                        },
                    )
                    .await?;
            }
        }
        self.synchronize().await;

        self.backend
            .raw_ballot(&caller.name, election_name)
            .await?
            .ok_or_else(|| Error::Internal("ballot missing after cast".to_string()))
    }

    pub async fn search_ballot(
        &self,
        caller: &Identity,
        voter_name: &str,
        election_name: &str,
    ) -> Result<Option<BallotView>> {
        let viewer = Viewer::named(&caller.name, caller.role);
        self.backend
            .search_ballot(voter_name, election_name, viewer)
            .await
    }

    pub async fn list_ballots(&self, caller: &Identity, election_name: &str) -> Result<Vec<BallotView>> {
        let viewer = Viewer::named(&caller.name, caller.role);
        self.backend.list_ballots(election_name, viewer).await
    }
}

fn validate_rankings(rankings: &[Rank], candidates: &HashSet<String>) -> Result<()> {
    let mut seen_candidates = HashSet::new();
    let mut seen_ranks = HashSet::new();
    for rank in rankings {
        if rank.rank == 0 {
            return Err(Error::validation("ranks must be positive"));
        }
        if !candidates.contains(&rank.candidate_name) {
            return Err(Error::validation(format!(
                "{} is not a candidate in this election",
                rank.candidate_name
            )));
        }
        if !seen_candidates.insert(&rank.candidate_name) {
            return Err(Error::validation(format!(
                "{} ranked more than once",
                rank.candidate_name
            )));
        }
        if !seen_ranks.insert(rank.rank) {
            return Err(Error::validation(format!(
                "rank {} assigned to more than one candidate",
                rank.rank
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_two_candidates_sharing_a_rank() {
        let candidates: HashSet<String> = ["A".to_string(), "B".to_string()].into_iter().collect();
        let rankings = vec![
            Rank { candidate_name: "A".to_string(), rank: 1 },
            Rank { candidate_name: "B".to_string(), rank: 1 },
        ];
        let err = validate_rankings(&rankings, &candidates).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }
}
