//! The closed set of entities and events that make up the voting domain.
//! Nothing in this module knows how it is stored; that is the concern of
//! [`crate::event_log`], [`crate::command`], [`crate::query`], and the
//! backend adapters under [`crate::backend`].

pub mod ballot;
pub mod election;
pub mod event;
pub mod role;
pub mod user;

pub use ballot::{Ballot, Rank};
pub use election::{Candidate, Election, EligibleVoter};
pub use event::{DomainEvent, EventEnvelope};
pub use role::{list_permissions, role_has_permission, Permission, Role};
pub use user::User;
