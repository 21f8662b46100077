//! The relational backend: a single sqlite database holding one table per
//! entity plus an append-only `events` table, accessed through a pooled
//! diesel connection. Grounded on the same `run_blocking` wrapper vaultwarden
//! uses to keep synchronous diesel calls off the async executor's threads,
//! simplified to a single sqlite connection type since this crate has no
//! mysql/postgres backends to unify.

mod models;
mod schema;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::serde::json::{json, Value};

use crate::command::CommandModel;
use crate::domain::{Ballot, Candidate, DomainEvent, EligibleVoter, Election, EventEnvelope, Rank, Role, User};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::query::{BallotView, QueryModel, Viewer};

use models::{BallotRow, CandidateRow, EligibleVoterRow, ElectionRow, EventRow, NewEventRow, SyncStateRow, UserRow};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/backend/sql/migrations");

type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// A wrapper around `spawn_blocking` that propagates panics to the caller,
/// matching the pattern vaultwarden's `db::run_blocking` uses to keep
/// synchronous diesel calls off the async executor.
async fn run_blocking<F, R>(job: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match rocket::tokio::task::spawn_blocking(job).await {
        Ok(ret) => ret,
        Err(e) => match e.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(_) => unreachable!("spawn_blocking tasks are never cancelled"),
        },
    }
}

/// SQLite only enforces foreign keys (and thus `ON DELETE CASCADE`) when
/// `PRAGMA foreign_keys = ON` has been issued on the connection; it is off
/// by default on every new connection. Mirrors vaultwarden's
/// `DbConnOptions::on_acquire` pragma-on-acquire pattern.
#[derive(Debug)]
struct EnableForeignKeys;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for EnableForeignKeys {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub struct SqlBackend {
    pool: SqlitePool,
}

impl SqlBackend {
    /// Build the connection pool, running any pending migrations against
    /// `url` before returning. Synchronous: only ever called once, while
    /// igniting the server.
    pub fn connect(url: &str) -> Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder()
            .connection_customizer(Box::new(EnableForeignKeys))
            .build(manager)
            .map_err(|e| Error::StorageUnavailable(format!("failed to build sqlite pool: {e}")))?;

        let mut conn = pool
            .get()
            .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::StorageUnavailable(format!("failed to run migrations: {e}")))?;

        Ok(Self { pool })
    }
}

#[rocket::async_trait]
impl EventLog for SqlBackend {
    async fn append(&self, authority: &str, when_occurred: DateTime<Utc>, event: DomainEvent) -> Result<u64> {
        let pool = self.pool.clone();
        let authority = authority.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            conn.transaction(|conn| -> Result<u64> {
                let row = NewEventRow::from_domain(&authority, when_occurred, &event)?;
                diesel::insert_into(schema::events::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
                let id: i64 = diesel::select(diesel::dsl::sql::<diesel::sql_types::BigInt>("last_insert_rowid()"))
                    .get_result(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
                Ok(id as u64)
            })
        })
        .await
    }

    async fn events_after(&self, cursor: u64) -> Result<Vec<EventEnvelope>> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let rows: Vec<EventRow> = schema::events::table
                .filter(schema::events::event_id.gt(cursor as i64))
                .order(schema::events::event_id.asc())
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            rows.into_iter().map(EventRow::into_envelope).collect()
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let count: i64 = schema::events::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }
}

#[rocket::async_trait]
impl CommandModel for SqlBackend {
    async fn last_synced(&self) -> Result<u64> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let row: SyncStateRow = schema::sync_state::table
                .find(0)
                .first(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(row.last_synced as u64)
        })
        .await
    }

    async fn set_last_synced(&self, event_id: u64) -> Result<()> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            diesel::update(schema::sync_state::table.find(0))
                .set(schema::sync_state::last_synced.eq(event_id as i64))
                .execute(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn apply(&self, envelope: &EventEnvelope) -> Result<()> {
        let pool = self.pool.clone();
        let envelope = envelope.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            conn.transaction(|conn| -> Result<()> {
                let row: SyncStateRow = schema::sync_state::table
                    .find(0)
                    .first(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
                if envelope.event_id as i64 <= row.last_synced {
                    return Ok(());
                }
                apply_event(conn, &envelope.event)?;
                diesel::update(schema::sync_state::table.find(0))
                    .set(schema::sync_state::last_synced.eq(envelope.event_id as i64))
                    .execute(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
                Ok(())
            })
        })
        .await
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Owner => "OWNER",
        Role::Admin => "ADMIN",
        Role::User => "USER",
    }
}

/// Apply one event's effect within an open transaction. Mirrors the
/// semantics of the in-memory backend's `apply_event`, expressed as diesel
/// statements instead of `HashMap` mutation.
fn apply_event(conn: &mut SqliteConnection, event: &DomainEvent) -> Result<()> {
    use schema::{ballots, candidates, eligible_voters, elections, users};

    match event {
        DomainEvent::UserRegistered {
            name,
            email,
            salt,
            hash,
            role,
        } => {
            let existing_count: i64 = users::table
                .count()
                .get_result(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let role = role.unwrap_or(if existing_count == 0 { Role::Owner } else { Role::User });
            let row = UserRow {
                name: name.clone(),
                email: email.clone(),
                salt: salt.clone(),
                hash: hash.clone(),
                role: role_to_str(role).to_string(),
            };
            diesel::insert_into(users::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::UserRoleChanged { name, role } => {
            diesel::update(users::table.find(name))
                .set(users::role.eq(role_to_str(*role)))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::UserPasswordChanged { name, salt, hash } => {
            diesel::update(users::table.find(name))
                .set((users::salt.eq(salt), users::hash.eq(hash)))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::UserEmailChanged { name, email } => {
            diesel::update(users::table.find(name))
                .set(users::email.eq(email))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::UserNameChanged { old_name, new_name } => {
            diesel::update(users::table.find(old_name))
                .set(users::name.eq(new_name))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            diesel::update(elections::table.filter(elections::owner_name.eq(old_name)))
                .set(elections::owner_name.eq(new_name))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            diesel::update(eligible_voters::table.filter(eligible_voters::voter_name.eq(old_name)))
                .set(eligible_voters::voter_name.eq(new_name))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            diesel::update(ballots::table.filter(ballots::voter_name.eq(old_name)))
                .set(ballots::voter_name.eq(new_name))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::UserRemoved { name } => {
            let owned: Vec<String> = elections::table
                .filter(elections::owner_name.eq(name))
                .select(elections::election_name)
                .load(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            for election_name in owned {
                diesel::delete(elections::table.find(&election_name))
                    .execute(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            }
            diesel::delete(eligible_voters::table.filter(eligible_voters::voter_name.eq(name)))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            diesel::delete(ballots::table.filter(ballots::voter_name.eq(name)))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            diesel::delete(users::table.find(name))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::ElectionCreated {
            election_name,
            owner_name,
        } => {
            let row = ElectionRow::from(&Election::new(election_name.clone(), owner_name.clone()));
            diesel::insert_into(elections::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::ElectionUpdated {
            election_name,
            secret_ballot,
            allow_vote,
            allow_edit,
            no_voting_before,
            no_voting_after,
        } => {
            let row: ElectionRow = elections::table
                .find(election_name)
                .first(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let mut election = Election::from(row);
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
            let row = ElectionRow::from(&election);
            diesel::update(elections::table.find(election_name))
                .set(&row)
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::ElectionDeleted { election_name } => {
            diesel::delete(elections::table.find(election_name))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::CandidatesAdded {
            election_name,
            candidates: names,
        } => {
            for candidate_name in names {
                diesel::insert_or_ignore_into(candidates::table)
                    .values(CandidateRow {
                        election_name: election_name.clone(),
                        candidate_name: candidate_name.clone(),
                    })
                    .execute(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            }
        }
        DomainEvent::CandidatesRemoved {
            election_name,
            candidates: names,
        } => {
            diesel::delete(
                candidates::table
                    .filter(candidates::election_name.eq(election_name))
                    .filter(candidates::candidate_name.eq_any(names)),
            )
            .execute(conn)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::VotersAdded {
            election_name,
            voters,
        } => {
            for voter_name in voters {
                diesel::insert_or_ignore_into(eligible_voters::table)
                    .values(EligibleVoterRow {
                        election_name: election_name.clone(),
                        voter_name: voter_name.clone(),
                    })
                    .execute(conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            }
        }
        DomainEvent::VotersRemoved {
            election_name,
            voters,
        } => {
            diesel::delete(
                eligible_voters::table
                    .filter(eligible_voters::election_name.eq(election_name))
                    .filter(eligible_voters::voter_name.eq_any(voters)),
            )
            .execute(conn)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::BallotCast {
            election_name,
            voter_name,
            confirmation,
            rankings,
            when_cast,
        } => {
            let existing: Option<BallotRow> = ballots::table
                .find((election_name, voter_name))
                .first(conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            let when_cast = existing.map(|ballot| ballot.when_cast).unwrap_or_else(|| when_cast.naive_utc());
            let row = BallotRow::from_domain(&Ballot {
                election_name: election_name.clone(),
                voter_name: voter_name.clone(),
                confirmation: confirmation.clone(),
                when_cast: DateTime::<Utc>::from_naive_utc_and_offset(when_cast, Utc),
                rankings: rankings.clone(),
            })?;
            diesel::replace_into(ballots::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::BallotTimestampUpdated {
            election_name,
            voter_name,
            when_cast,
        } => {
            diesel::update(ballots::table.find((election_name, voter_name)))
                .set(ballots::when_cast.eq(when_cast.naive_utc()))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        DomainEvent::BallotRankingsChanged {
            election_name,
            voter_name,
            rankings,
        } => {
            let rankings = rocket::serde::json::serde_json::to_string(rankings)
                .map_err(|e| Error::Internal(format!("failed to serialize rankings: {e}")))?;
            diesel::update(ballots::table.find((election_name, voter_name)))
                .set(ballots::rankings.eq(rankings))
                .execute(conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
    }
    Ok(())
}

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

#[rocket::async_trait]
impl QueryModel for SqlBackend {
    async fn find_user_by_name(&self, name: &str) -> Result<User> {
        let pool = self.pool.clone();
        let name = name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            schema::users::table
                .find(&name)
                .first::<UserRow>(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .map(User::from)
                .ok_or_else(|| Error::not_found(format!("no user named {name}")))
        })
        .await
    }

    async fn search_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let pool = self.pool.clone();
        let email = email.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            Ok(schema::users::table
                .filter(schema::users::email.eq(&email))
                .first::<UserRow>(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .map(User::from))
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let rows: Vec<UserRow> = schema::users::table
                .order(schema::users::name.asc())
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(rows.into_iter().map(User::from).collect())
        })
        .await
    }

    async fn user_count(&self) -> Result<u64> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let count: i64 = schema::users::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn search_election_by_name(&self, election_name: &str) -> Result<Option<Election>> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            Ok(schema::elections::table
                .find(&election_name)
                .first::<ElectionRow>(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .map(Election::from))
        })
        .await
    }

    async fn list_elections(&self) -> Result<Vec<Election>> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let rows: Vec<ElectionRow> = schema::elections::table
                .order(schema::elections::election_name.asc())
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(rows.into_iter().map(Election::from).collect())
        })
        .await
    }

    async fn election_count(&self) -> Result<u64> {
        let pool = self.pool.clone();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let count: i64 = schema::elections::table
                .count()
                .get_result(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_candidates(&self, election_name: &str) -> Result<Vec<Candidate>> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let rows: Vec<CandidateRow> = schema::candidates::table
                .filter(schema::candidates::election_name.eq(&election_name))
                .order(schema::candidates::candidate_name.asc())
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(rows.into_iter().map(Candidate::from).collect())
        })
        .await
    }

    async fn candidate_count(&self, election_name: &str) -> Result<u64> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let count: i64 = schema::candidates::table
                .filter(schema::candidates::election_name.eq(&election_name))
                .count()
                .get_result(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_voters_for_election(&self, election_name: &str) -> Result<Vec<String>> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            schema::eligible_voters::table
                .filter(schema::eligible_voters::election_name.eq(&election_name))
                .order(schema::eligible_voters::voter_name.asc())
                .select(schema::eligible_voters::voter_name)
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))
        })
        .await
    }

    async fn voter_count(&self, election_name: &str) -> Result<u64> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let count: i64 = schema::eligible_voters::table
                .filter(schema::eligible_voters::election_name.eq(&election_name))
                .count()
                .get_result(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn search_ballot(
        &self,
        voter_name: &str,
        election_name: &str,
        viewer: Viewer<'_>,
    ) -> Result<Option<BallotView>> {
        let pool = self.pool.clone();
        let voter_name = voter_name.to_string();
        let election_name = election_name.to_string();
        let viewer_name = viewer.name.map(|n| n.to_string());
        let viewer_role = viewer.role;
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let Some(election) = schema::elections::table
                .find(&election_name)
                .first::<ElectionRow>(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .map(Election::from)
            else {
                return Ok(None);
            };
            let viewer = Viewer {
                name: viewer_name.as_deref(),
                role: viewer_role,
            };
            let row: Option<BallotRow> = schema::ballots::table
                .find((&election_name, &voter_name))
                .first(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            row.map(|row| row.into_domain())
                .transpose()?
                .map(|ballot| redact(&ballot, &election, viewer))
                .map(Ok)
                .transpose()
        })
        .await
    }

    async fn list_ballots(&self, election_name: &str, viewer: Viewer<'_>) -> Result<Vec<BallotView>> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        let viewer_name = viewer.name.map(|n| n.to_string());
        let viewer_role = viewer.role;
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let Some(election) = schema::elections::table
                .find(&election_name)
                .first::<ElectionRow>(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                .map(Election::from)
            else {
                return Ok(Vec::new());
            };
            let viewer = Viewer {
                name: viewer_name.as_deref(),
                role: viewer_role,
            };
            let rows: Vec<BallotRow> = schema::ballots::table
                .filter(schema::ballots::election_name.eq(&election_name))
                .order(schema::ballots::confirmation.asc())
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            rows.into_iter()
                .map(|row| row.into_domain().map(|ballot| redact(&ballot, &election, viewer)))
                .collect()
        })
        .await
    }

    async fn list_rankings(&self, voter_name: &str, election_name: &str) -> Result<Vec<Rank>> {
        let pool = self.pool.clone();
        let voter_name = voter_name.to_string();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let row: Option<BallotRow> = schema::ballots::table
                .find((&election_name, &voter_name))
                .first(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            Ok(row.map(|row| row.into_domain()).transpose()?.map(|b| b.rankings).unwrap_or_default())
        })
        .await
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
        let pool = self.pool.clone();
        let table_name = table_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let rows = match table_name.as_str() {
                "users" => schema::users::table
                    .load::<UserRow>(&mut conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                    .into_iter()
                    .map(|row| json!(User::from(row)))
                    .collect(),
                "elections" => schema::elections::table
                    .load::<ElectionRow>(&mut conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                    .into_iter()
                    .map(|row| json!(Election::from(row)))
                    .collect(),
                "candidates" => schema::candidates::table
                    .load::<CandidateRow>(&mut conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                    .into_iter()
                    .map(|row| json!(Candidate::from(row)))
                    .collect(),
                "eligible_voters" => schema::eligible_voters::table
                    .load::<EligibleVoterRow>(&mut conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                    .into_iter()
                    .map(|row| json!(EligibleVoter::from(row)))
                    .collect(),
                "ballots" => schema::ballots::table
                    .load::<BallotRow>(&mut conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                    .into_iter()
                    .map(|row| row.into_domain().map(|ballot| json!(ballot)))
                    .collect::<Result<Vec<_>>>()?,
                "events" => schema::events::table
                    .order(schema::events::event_id.asc())
                    .load::<EventRow>(&mut conn)
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?
                    .into_iter()
                    .map(|row| row.into_envelope().map(|envelope| json!(envelope)))
                    .collect::<Result<Vec<_>>>()?,
                other => return Err(Error::not_found(format!("no such table {other}"))),
            };
            Ok(rows)
        })
        .await
    }

    async fn last_synced(&self) -> Result<u64> {
        CommandModel::last_synced(self).await
    }

    async fn raw_ballot(&self, voter_name: &str, election_name: &str) -> Result<Option<Ballot>> {
        let pool = self.pool.clone();
        let voter_name = voter_name.to_string();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let row: Option<BallotRow> = schema::ballots::table
                .find((&election_name, &voter_name))
                .first(&mut conn)
                .optional()
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            row.map(|row| row.into_domain()).transpose()
        })
        .await
    }

    async fn raw_ballots(&self, election_name: &str) -> Result<Vec<Ballot>> {
        let pool = self.pool.clone();
        let election_name = election_name.to_string();
        run_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| Error::StorageUnavailable(format!("failed to acquire sqlite connection: {e}")))?;
            let rows: Vec<BallotRow> = schema::ballots::table
                .filter(schema::ballots::election_name.eq(&election_name))
                .load(&mut conn)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            rows.into_iter().map(|row| row.into_domain()).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::synchronize;

    fn test_backend() -> SqlBackend {
        SqlBackend::connect(":memory:").expect("failed to build in-memory sqlite backend")
    }

    async fn register(backend: &SqlBackend, name: &str) -> u64 {
        backend
            .append(
                "system",
                Utc::now(),
                DomainEvent::UserRegistered {
                    name: name.to_string(),
                    email: format!("{name}@example.com"),
                    salt: "s".to_string(),
                    hash: "h".to_string(),
                    role: None,
                },
            )
            .await
            .unwrap()
    }

    #[rocket::async_test]
    async fn first_registrant_becomes_owner() {
        let backend = test_backend();
        register(&backend, "alice").await;
        synchronize(&backend, &backend).await.unwrap();
        register(&backend, "bob").await;
        synchronize(&backend, &backend).await.unwrap();

        let alice = backend.find_user_by_name("alice").await.unwrap();
        let bob = backend.find_user_by_name("bob").await.unwrap();
        assert_eq!(alice.role, Role::Owner);
        assert_eq!(bob.role, Role::User);
    }

    #[rocket::async_test]
    async fn event_ids_are_gap_free_and_monotonic() {
        let backend = test_backend();
        let a = register(&backend, "alice").await;
        let b = register(&backend, "bob").await;
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(backend.count().await.unwrap(), 2);
    }

    #[rocket::async_test]
    async fn deleting_election_cascades() {
        let backend = test_backend();
        register(&backend, "alice").await;
        synchronize(&backend, &backend).await.unwrap();
        backend
            .append(
                "alice",
                Utc::now(),
                DomainEvent::ElectionCreated {
                    election_name: "e".to_string(),
                    owner_name: "alice".to_string(),
                },
            )
            .await
            .unwrap();
        backend
            .append(
                "alice",
                Utc::now(),
                DomainEvent::CandidatesAdded {
                    election_name: "e".to_string(),
                    candidates: vec!["A".to_string(), "B".to_string()],
                },
            )
            .await
            .unwrap();
        synchronize(&backend, &backend).await.unwrap();
        assert_eq!(backend.list_candidates("e").await.unwrap().len(), 2);

        backend
            .append(
                "alice",
                Utc::now(),
                DomainEvent::ElectionDeleted {
                    election_name: "e".to_string(),
                },
            )
            .await
            .unwrap();
        synchronize(&backend, &backend).await.unwrap();

        assert!(backend.list_candidates("e").await.unwrap().is_empty());
        assert!(backend.search_election_by_name("e").await.unwrap().is_none());
    }
}
