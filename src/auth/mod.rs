//! Role-to-permission enforcement at the boundary of each [`crate::service`]
//! operation. The fixed role table itself lives in [`crate::domain::role`];
//! this module is the thin layer that turns a decoded [`Identity`] plus an
//! optional ownership fact into an allow/deny decision.

use crate::domain::{Election, Permission};
use crate::error::{Error, Result};
use crate::token::Identity;

/// Require that `identity` carries `permission`, regardless of ownership.
pub fn require_permission(identity: &Identity, permission: Permission) -> Result<()> {
    if crate::domain::role_has_permission(identity.role, permission) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "{} lacks permission {permission:?}",
            identity.name
        )))
    }
}

/// Require that `identity` either holds `blanket` (e.g. MANAGE_ANY_ELECTION)
/// or owns `election` and holds `own` (e.g. MANAGE_OWN_ELECTION).
pub fn require_election_manager(
    identity: &Identity,
    election: &Election,
    own: Permission,
    blanket: Permission,
) -> Result<()> {
    if crate::domain::role_has_permission(identity.role, blanket) {
        return Ok(());
    }
    if identity.name == election.owner_name && crate::domain::role_has_permission(identity.role, own)
    {
        return Ok(());
    }
    Err(Error::forbidden(format!(
        "{} may not manage election {}",
        identity.name, election.election_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn identity(name: &str, role: Role) -> Identity {
        Identity {
            name: name.to_string(),
            role,
        }
    }

    fn election(owner: &str) -> Election {
        Election::new("e".to_string(), owner.to_string())
    }

    #[test]
    fn owner_may_manage_own_election() {
        let id = identity("alice", Role::Admin);
        let e = election("alice");
        assert!(require_election_manager(
            &id,
            &e,
            Permission::ManageOwnElection,
            Permission::ManageAnyElection
        )
        .is_ok());
    }

    #[test]
    fn non_owner_admin_cannot_manage_someone_elses_election() {
        let id = identity("bob", Role::Admin);
        let e = election("alice");
        assert!(require_election_manager(
            &id,
            &e,
            Permission::ManageOwnElection,
            Permission::ManageAnyElection
        )
        .is_err());
    }

    #[test]
    fn owner_role_manages_any_election() {
        let id = identity("root", Role::Owner);
        let e = election("alice");
        assert!(require_election_manager(
            &id,
            &e,
            Permission::ManageOwnElection,
            Permission::ManageAnyElection
        )
        .is_ok());
    }
}
