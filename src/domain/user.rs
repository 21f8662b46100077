use serde::{Deserialize, Serialize};

use super::role::Role;

/// Materialized user state, keyed by the unique `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub salt: String,
    pub hash: String,
    pub role: Role,
}
