#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod auth;
pub mod backend;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_log;
pub mod integrations;
pub mod logging;
pub mod query;
pub mod service;
pub mod tally;
pub mod token;

use config::{ConfigFairing, ServiceFairing};
use logging::LoggerFairing;

/// Assemble the full application: routes, config, and the storage backend
/// selected by configuration. Split out from `main` so the `backend_test`
/// proc macro and integration tests can build a fresh instance per test.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(ServiceFairing)
        .attach(LoggerFairing)
}

/// Assemble an application around an already-constructed [`service::Service`],
/// bypassing [`ConfigFairing`]/[`ServiceFairing`]. Used by the `backend_test`
/// proc macro and integration tests to get a fresh, isolated [`MemoryBackend`]
/// per test without loading `Rocket.toml`.
///
/// [`MemoryBackend`]: backend::memory::MemoryBackend
#[doc(hidden)]
pub fn build_for_service(service: service::Service) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .manage(service)
        .attach(LoggerFairing)
}

/// A fresh [`service::Service`] over a brand new [`backend::memory::MemoryBackend`],
/// with deterministic collaborators suitable for tests: a fixed JWT secret, the
/// system clock, UUID ids, real Argon2 hashing, and a notifications sink that
/// only logs. Every call returns an independent backend.
#[doc(hidden)]
pub fn test_service() -> service::Service {
    use std::sync::Arc;

    use integrations::{Argon2PasswordUtil, LogNotifications, SystemClock, UuidGenerator};
    use token::JwtTokenIssuer;

    let backend: Arc<dyn backend::Backend> = Arc::new(backend::memory::MemoryBackend::new());
    let tokens = Arc::new(JwtTokenIssuer::new(
        b"test-secret-do-not-use-in-production".to_vec(),
        chrono::Duration::minutes(15),
        chrono::Duration::days(7),
    ));
    service::Service::new(
        backend,
        tokens,
        Arc::new(SystemClock),
        Arc::new(UuidGenerator),
        Arc::new(Argon2PasswordUtil),
        Arc::new(LogNotifications),
    )
}
