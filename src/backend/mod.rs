//! Concrete implementations of the {[`crate::event_log::EventLog`],
//! [`crate::command::CommandModel`], [`crate::query::QueryModel`]} triple.
//! All backends must be observationally indistinguishable through the query
//! model given the same event history.

pub mod memory;

#[cfg(feature = "backend_sql")]
pub mod sql;

#[cfg(feature = "backend_widecolumn")]
pub mod widecolumn;

use crate::command::CommandModel;
use crate::event_log::EventLog;
use crate::query::QueryModel;

/// A fully wired storage backend: event log, command model, and query model
/// over the same underlying store.
pub trait Backend: EventLog + CommandModel + QueryModel {}

impl<T: EventLog + CommandModel + QueryModel> Backend for T {}
