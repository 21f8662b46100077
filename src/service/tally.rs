use crate::auth::require_permission;
use crate::domain::Permission;
use crate::error::{Error, Result};
use crate::query::QueryModel;
use crate::tally::{compute_tally, TallyResult};
use crate::token::Identity;

use super::Service;

impl Service {
    /// Compute the Condorcet tally for an election. Permitted once the
    /// election has launched (ballots may still be arriving) or finalized.
    pub async fn tally(&self, caller: &Identity, election_name: &str) -> Result<TallyResult> {
        require_permission(caller, Permission::ViewTally)?;
        let election = self.find_election(election_name).await?;
        if election.is_draft() {
            return Err(Error::precondition(format!(
                "election {election_name} has not launched"
            )));
        }
        let candidates: Vec<String> = self
            .backend
            .list_candidates(election_name)
            .await?
            .into_iter()
            .map(|c| c.candidate_name)
            .collect();
        let ballots = self.backend.raw_ballots(election_name).await?;
        Ok(compute_tally(&ballots, &candidates))
    }

    /// Names of the raw storage tables/collections, for the admin dump.
    pub async fn list_tables(&self, caller: &Identity) -> Result<Vec<String>> {
        require_permission(caller, Permission::ViewAdminTables)?;
        self.backend.list_tables().await
    }

    /// Raw rows of one table/collection, for the admin dump.
    pub async fn table_data(&self, caller: &Identity, table_name: &str) -> Result<Vec<rocket::serde::json::Value>> {
        require_permission(caller, Permission::ViewAdminTables)?;
        self.backend.table_data(table_name).await
    }

    pub fn list_permissions(&self, role: crate::domain::Role) -> Vec<Permission> {
        crate::domain::list_permissions(role)
    }
}
