use log::{error, warn};
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

/// The full error taxonomy surfaced by the core. Every failure mode named in
/// the domain model maps to exactly one of these variants, which in turn maps
/// to exactly one HTTP status code at the API boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Request shape or content is invalid: empty names, duplicate candidates,
    /// an unknown candidate referenced by a ballot, and so on.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (duplicate natural key).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller's role or ownership does not permit this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No valid token was presented.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request is well-formed but the entity is not in a state that
    /// permits it, e.g. casting a ballot before the election has launched.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The backing store rejected a read or write.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A caller-supplied deadline elapsed before the operation completed.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An invariant that should be impossible to violate was violated, e.g.
    /// the sync cursor moving backward, or an unknown event type tag read
    /// back from storage.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Argon2(#[from] argon2::Error),

    #[cfg(feature = "backend_sql")]
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),
}

impl Error {
    pub fn not_found(cause: impl Into<String>) -> Self {
        Self::NotFound(cause.into())
    }

    pub fn conflict(cause: impl Into<String>) -> Self {
        Self::Conflict(cause.into())
    }

    pub fn validation(cause: impl Into<String>) -> Self {
        Self::ValidationFailed(cause.into())
    }

    pub fn forbidden(cause: impl Into<String>) -> Self {
        Self::Forbidden(cause.into())
    }

    pub fn precondition(cause: impl Into<String>) -> Self {
        Self::PreconditionFailed(cause.into())
    }

    /// Get the HTTP response status associated with this error.
    pub fn status(&self) -> Status {
        match self {
            Error::ValidationFailed(_) => Status::BadRequest,
            Error::NotFound(_) => Status::NotFound,
            Error::Conflict(_) => Status::Conflict,
            Error::Forbidden(_) => Status::Forbidden,
            Error::Unauthorized(_) => Status::Unauthorized,
            Error::PreconditionFailed(_) => Status::PreconditionFailed,
            Error::StorageUnavailable(_) => Status::ServiceUnavailable,
            Error::Timeout(_) => Status::GatewayTimeout,
            Error::Internal(_) => Status::InternalServerError,
            Error::Jwt(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
                | jsonwebtoken::errors::ErrorKind::ImmatureSignature => Status::Unauthorized,
                _ => Status::BadRequest,
            },
            Error::Argon2(_) => Status::BadRequest,
            #[cfg(feature = "backend_sql")]
            Error::Diesel(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let id = req.local_cache(RequestId::next);
        let log_msg = format!("  req{id} {self}");
        if status.class() == StatusClass::ServerError {
            error!("{log_msg}");
        } else {
            warn!("{log_msg}");
        }
        Err(status)
    }
}
