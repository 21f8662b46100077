use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::Error;
use crate::service::Service;
use crate::token::Identity;

/// The caller's decoded identity, extracted from a `Bearer` access token in
/// the `Authorization` header. Fails the request with 401 when the header
/// is missing or the token does not decode.
pub struct CallerIdentity(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallerIdentity {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let service = req.guard::<&State<Service>>().await.unwrap();

        let Some(header) = req.headers().get_one("Authorization") else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("missing Authorization header".to_string()),
            ));
        };
        let Some(token) = header.strip_prefix("Bearer ") else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("Authorization header must be a Bearer token".to_string()),
            ));
        };

        match service.tokens.decode(token) {
            Ok(identity) => Outcome::Success(CallerIdentity(identity)),
            Err(_) => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("invalid or expired access token".to_string()),
            )),
        }
    }
}
