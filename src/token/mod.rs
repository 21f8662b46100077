use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::Role;
use crate::error::{Error, Result};
use crate::integrations::Clock;

/// The two kinds of token this crate issues. Encoded into the claims so an
/// access token cannot be replayed as a refresh token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum TokenKind {
    #[serde(rename = "access")]
    Access,
    #[serde(rename = "refresh")]
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    name: String,
    role: Role,
    kind: TokenKind,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// An authenticated identity recovered from a decoded access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub role: Role,
}

/// A matched pair of tokens returned from [`TokenIssuer::issue`] or
/// [`TokenIssuer::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and validates the bearer tokens that carry a user's identity and
/// role across requests. Injected as an interface so the core does not
/// depend on a specific JWT library.
pub trait TokenIssuer: Send + Sync {
    /// Mint a fresh access/refresh pair for `name` with `role`.
    fn issue(&self, name: &str, role: Role) -> Result<TokenPair>;

    /// Recover the identity carried by an access token. Fails if the token
    /// is expired, malformed, or is actually a refresh token.
    fn decode(&self, access: &str) -> Result<Identity>;

    /// Mint a fresh access/refresh pair from a still-valid refresh token.
    /// Fails if the token is expired, malformed, or is actually an access
    /// token.
    fn refresh(&self, refresh: &str) -> Result<TokenPair>;
}

/// A [`TokenIssuer`] backed by HMAC-signed JWTs.
pub struct JwtTokenIssuer {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Box<dyn Clock>,
}

impl JwtTokenIssuer {
    pub fn new(secret: Vec<u8>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self::with_clock(
            secret,
            access_ttl,
            refresh_ttl,
            Box::new(crate::integrations::clock::SystemClock),
        )
    }

    pub fn with_clock(
        secret: Vec<u8>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            secret,
            access_ttl,
            refresh_ttl,
            clock,
        }
    }

    fn encode(&self, name: &str, role: Role, kind: TokenKind, ttl: Duration) -> Result<String> {
        let claims = Claims {
            name: name.to_string(),
            role,
            kind,
            expire_at: self.clock.now() + ttl,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?;
        Ok(token)
    }

    fn decode_kind(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let data: TokenData<Claims> = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )?;
        if data.claims.kind != expected {
            return Err(Error::Unauthorized("wrong token kind".to_string()));
        }
        Ok(data.claims)
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, name: &str, role: Role) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.encode(name, role, TokenKind::Access, self.access_ttl)?,
            refresh: self.encode(name, role, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    fn decode(&self, access: &str) -> Result<Identity> {
        let claims = self.decode_kind(access, TokenKind::Access)?;
        Ok(Identity {
            name: claims.name,
            role: claims.role,
        })
    }

    fn refresh(&self, refresh: &str) -> Result<TokenPair> {
        let claims = self.decode_kind(refresh, TokenKind::Refresh)?;
        self.issue(&claims.name, claims.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::clock::FixedClock;

    fn issuer_at(now: DateTime<Utc>) -> JwtTokenIssuer {
        JwtTokenIssuer::with_clock(
            b"test-secret".to_vec(),
            Duration::minutes(15),
            Duration::days(7),
            Box::new(FixedClock(now)),
        )
    }

    #[test]
    fn issues_and_decodes_access_token() {
        let issuer = issuer_at(Utc::now());
        let pair = issuer.issue("alice", Role::Admin).unwrap();
        let identity = issuer.decode(&pair.access).unwrap();
        assert_eq!(identity.name, "alice");
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn refresh_token_cannot_be_used_as_access_token() {
        let issuer = issuer_at(Utc::now());
        let pair = issuer.issue("alice", Role::User).unwrap();
        assert!(issuer.decode(&pair.refresh).is_err());
    }

    #[test]
    fn refresh_mints_a_new_pair() {
        let issuer = issuer_at(Utc::now());
        let pair = issuer.issue("bob", Role::Owner).unwrap();
        let refreshed = issuer.refresh(&pair.refresh).unwrap();
        let identity = issuer.decode(&refreshed.access).unwrap();
        assert_eq!(identity.name, "bob");
        assert_eq!(identity.role, Role::Owner);
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let past = Utc::now() - Duration::days(1);
        let issuer = issuer_at(past);
        let pair = issuer.issue("carol", Role::User).unwrap();
        assert!(issuer.decode(&pair.access).is_err());
    }
}
