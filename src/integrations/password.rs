use argon2::Config as Argon2Config;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{Error, Result};

/// Salts and hashes passwords, and verifies a password against a stored
/// salt/hash pair. Injected so the core does not depend directly on a
/// specific hashing library's API.
pub trait PasswordUtil: Send + Sync {
    fn create_salt_and_hash(&self, password: &str) -> Result<(String, String)>;
    fn verify(&self, password: &str, salt: &str, hash: &str) -> Result<bool>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordUtil;

impl PasswordUtil for Argon2PasswordUtil {
    fn create_salt_and_hash(&self, password: &str) -> Result<(String, String)> {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(22)
            .map(char::from)
            .collect();
        let hash = argon2::hash_encoded(
            password.as_bytes(),
            salt.as_bytes(),
            &Argon2Config::default(),
        )
        .map_err(Error::from)?;
        Ok((salt, hash))
    }

    fn verify(&self, password: &str, _salt: &str, hash: &str) -> Result<bool> {
        Ok(argon2::verify_encoded(hash, password.as_bytes()).map_err(Error::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_password() {
        let util = Argon2PasswordUtil;
        let (salt, hash) = util.create_salt_and_hash("correct horse battery staple").unwrap();
        assert!(util.verify("correct horse battery staple", &salt, &hash).unwrap());
        assert!(!util.verify("wrong", &salt, &hash).unwrap());
    }
}
