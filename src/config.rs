use std::sync::Arc;

use chrono::Duration;
use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::backend::memory::MemoryBackend;
use crate::backend::Backend;
use crate::integrations::{Argon2PasswordUtil, LogNotifications, SystemClock, UuidGenerator};
use crate::service::Service;
use crate::token::JwtTokenIssuer;

/// Which storage backend to wire up. Selected via `backend` in `Rocket.toml`
/// or the `ROCKET_BACKEND` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Sql,
    WideColumn,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    backend: BackendKind,
    access_ttl: i64,
    refresh_ttl: i64,
    // secrets
    jwt_secret: String,
    #[serde(default)]
    sql_database_url: Option<String>,
    #[serde(default)]
    wide_column_uri: Option<String>,
    #[serde(default)]
    wide_column_database: Option<String>,
    /// Optional deterministic seed for testing, e.g. used to name a
    /// scratch wide-column database rather than a random one.
    #[serde(default)]
    deterministic_seed: Option<u64>,
}

impl Config {
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Valid lifetime of issued access tokens.
    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_ttl)
    }

    /// Valid lifetime of issued refresh tokens.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl)
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    pub fn sql_database_url(&self) -> Option<&str> {
        self.sql_database_url.as_deref()
    }

    pub fn wide_column_uri(&self) -> Option<&str> {
        self.wide_column_uri.as_deref()
    }

    pub fn wide_column_database(&self) -> String {
        match (&self.wide_column_database, self.deterministic_seed) {
            (Some(name), _) => name.clone(),
            (None, Some(seed)) => format!("condorcet{seed}"),
            (None, None) => "condorcet".to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that, once [`Config`] is available, constructs the selected
/// storage backend and wires together the [`Service`] orchestrator, placing
/// it into managed state.
pub struct ServiceFairing;

#[rocket::async_trait]
impl Fairing for ServiceFairing {
    fn info(&self) -> Info {
        Info {
            name: "Service",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config: &Config = match rocket.state() {
            Some(config) => config,
            None => {
                error!("Service fairing requires Config to already be managed");
                return Err(rocket);
            }
        };

        let backend: Arc<dyn Backend> = match construct_backend(config).await {
            Ok(backend) => backend,
            Err(e) => {
                error!("Failed to initialise storage backend: {e}");
                return Err(rocket);
            }
        };

        let tokens = Arc::new(JwtTokenIssuer::new(
            config.jwt_secret().to_vec(),
            config.access_ttl(),
            config.refresh_ttl(),
        ));

        let service = Service::new(
            backend,
            tokens,
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
            Arc::new(Argon2PasswordUtil),
            Arc::new(LogNotifications),
        );

        info!("Storage backend initialised: {:?}", config.backend());
        rocket = rocket.manage(service);
        Ok(rocket)
    }
}

async fn construct_backend(config: &Config) -> Result<Arc<dyn Backend>, String> {
    match config.backend() {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        #[cfg(feature = "backend_sql")]
        BackendKind::Sql => {
            let url = config
                .sql_database_url()
                .ok_or_else(|| "sql_database_url is required for the sql backend".to_string())?;
            let backend = crate::backend::sql::SqlBackend::connect(url).map_err(|e| e.to_string())?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "backend_sql"))]
        BackendKind::Sql => Err("this build was not compiled with the backend_sql feature".to_string()),
        #[cfg(feature = "backend_widecolumn")]
        BackendKind::WideColumn => {
            let uri = config
                .wide_column_uri()
                .ok_or_else(|| "wide_column_uri is required for the widecolumn backend".to_string())?;
            let backend = crate::backend::widecolumn::WideColumnBackend::connect(
                uri,
                &config.wide_column_database(),
            )
            .await
            .map_err(|e| e.to_string())?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "backend_widecolumn"))]
        BackendKind::WideColumn => {
            Err("this build was not compiled with the backend_widecolumn feature".to_string())
        }
    }
}
