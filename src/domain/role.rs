use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Privilege levels. Exactly one user holds [`Role::Owner`] at any time: the
/// first registrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Admin,
    User,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Owner => "OWNER",
                Self::Admin => "ADMIN",
                Self::User => "USER",
            }
        )
    }
}

/// Fine-grained capabilities that an operation may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ManageUsers,
    ManageAnyElection,
    ManageOwnElection,
    Vote,
    ViewTally,
    ViewBallotOwn,
    ViewBallotAny,
    ViewAdminTables,
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::Vote,
    Permission::ViewTally,
    Permission::ViewBallotOwn,
];

const ADMIN_ONLY_PERMISSIONS: &[Permission] =
    &[Permission::ManageOwnElection, Permission::ViewBallotAny];

const OWNER_ONLY_PERMISSIONS: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ManageAnyElection,
    Permission::ViewAdminTables,
];

/// Does `role` carry `permission`? OWNER is a superset of ADMIN, which is a
/// superset of USER.
pub fn role_has_permission(role: Role, permission: Permission) -> bool {
    list_permissions(role).contains(&permission)
}

/// All permissions held by `role`, owner-first.
pub fn list_permissions(role: Role) -> Vec<Permission> {
    match role {
        Role::User => USER_PERMISSIONS.to_vec(),
        Role::Admin => USER_PERMISSIONS
            .iter()
            .chain(ADMIN_ONLY_PERMISSIONS)
            .copied()
            .collect(),
        Role::Owner => USER_PERMISSIONS
            .iter()
            .chain(ADMIN_ONLY_PERMISSIONS)
            .chain(OWNER_ONLY_PERMISSIONS)
            .copied()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_strict_superset_of_admin_and_user() {
        let owner = list_permissions(Role::Owner);
        for permission in list_permissions(Role::Admin) {
            assert!(owner.contains(&permission));
        }
        for permission in list_permissions(Role::User) {
            assert!(owner.contains(&permission));
        }
        assert!(owner.contains(&Permission::ManageUsers));
        assert!(!list_permissions(Role::Admin).contains(&Permission::ManageUsers));
    }

    #[test]
    fn user_cannot_manage_elections() {
        assert!(!role_has_permission(Role::User, Permission::ManageOwnElection));
        assert!(!role_has_permission(Role::User, Permission::ManageAnyElection));
    }
}
