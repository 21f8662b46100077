use crate::auth::require_permission;
use crate::domain::{Permission, Role, User};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::query::QueryModel;
use crate::token::{Identity, TokenPair};

use super::Service;

impl Service {
    /// Create a new user. The very first registrant becomes OWNER; every
    /// later registrant is USER regardless of what the caller asked for —
    /// promotions happen afterwards via [`Self::set_role`].
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(User, TokenPair)> {
        validate_natural_key(name, "user name")?;
        if email.trim().is_empty() {
            return Err(Error::validation("email must not be empty"));
        }
        if self.backend.find_user_by_name(name).await.is_ok() {
            return Err(Error::conflict(format!("user {name} already exists")));
        }
        if self
            .backend
            .search_user_by_email(email)
            .await?
            .is_some()
        {
            return Err(Error::conflict(format!("email {email} already registered")));
        }

        let (salt, hash) = self.passwords.create_salt_and_hash(password)?;
        self.backend
            .append(
                "system",
                self.clock.now(),
                crate::domain::DomainEvent::UserRegistered {
                    name: name.to_string(),
                    email: email.to_string(),
                    salt,
                    hash,
                    role: None,
                },
            )
            .await?;
        self.synchronize().await;

        let user = self.backend.find_user_by_name(name).await?;
        self.notifications
            .emit_line(&format!("user {name} registered with role {}", user.role));
        let tokens = self.tokens.issue(&user.name, user.role)?;
        Ok((user, tokens))
    }

    /// Verify a password and mint a fresh token pair.
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<TokenPair> {
        let user = self
            .backend
            .find_user_by_name(name)
            .await
            .map_err(|_| Error::Unauthorized("invalid credentials".to_string()))?;
        let ok = self.passwords.verify(password, &user.salt, &user.hash)?;
        if !ok {
            return Err(Error::Unauthorized("invalid credentials".to_string()));
        }
        self.tokens.issue(&user.name, user.role)
    }

    pub async fn set_role(&self, caller: &Identity, target_name: &str, role: Role) -> Result<()> {
        require_permission(caller, Permission::ManageUsers)?;
        let target = self.backend.find_user_by_name(target_name).await?;
        let owners = self
            .backend
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Owner)
            .count();
        if target.role == Role::Owner && role != Role::Owner && owners <= 1 {
            return Err(Error::precondition("cannot demote the only OWNER"));
        }
        if role == Role::Owner && target.role != Role::Owner && owners >= 1 {
            return Err(Error::precondition("an OWNER already exists"));
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                crate::domain::DomainEvent::UserRoleChanged {
                    name: target_name.to_string(),
                    role,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn set_password(&self, caller: &Identity, target_name: &str, new_password: &str) -> Result<()> {
        self.require_self_or_manage_users(caller, target_name)?;
        self.backend.find_user_by_name(target_name).await?;
        let (salt, hash) = self.passwords.create_salt_and_hash(new_password)?;
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                crate::domain::DomainEvent::UserPasswordChanged {
                    name: target_name.to_string(),
                    salt,
                    hash,
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn set_email(&self, caller: &Identity, target_name: &str, new_email: &str) -> Result<()> {
        self.require_self_or_manage_users(caller, target_name)?;
        self.backend.find_user_by_name(target_name).await?;
        if new_email.trim().is_empty() {
            return Err(Error::validation("email must not be empty"));
        }
        if let Some(existing) = self.backend.search_user_by_email(new_email).await? {
            if existing.name != target_name {
                return Err(Error::conflict(format!("email {new_email} already registered")));
            }
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                crate::domain::DomainEvent::UserEmailChanged {
                    name: target_name.to_string(),
                    email: new_email.to_string(),
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn set_user_name(&self, caller: &Identity, target_name: &str, new_name: &str) -> Result<()> {
        self.require_self_or_manage_users(caller, target_name)?;
        validate_natural_key(new_name, "user name")?;
        self.backend.find_user_by_name(target_name).await?;
        if self.backend.find_user_by_name(new_name).await.is_ok() {
            return Err(Error::conflict(format!("user {new_name} already exists")));
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                crate::domain::DomainEvent::UserNameChanged {
                    old_name: target_name.to_string(),
                    new_name: new_name.to_string(),
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn remove_user(&self, caller: &Identity, target_name: &str) -> Result<()> {
        require_permission(caller, Permission::ManageUsers)?;
        let target = self.backend.find_user_by_name(target_name).await?;
        if target.role == Role::Owner {
            return Err(Error::precondition("cannot remove the OWNER"));
        }
        self.backend
            .append(
                &caller.name,
                self.clock.now(),
                crate::domain::DomainEvent::UserRemoved {
                    name: target_name.to_string(),
                },
            )
            .await?;
        self.synchronize().await;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.backend.list_users().await
    }

    pub async fn find_user(&self, name: &str) -> Result<User> {
        self.backend.find_user_by_name(name).await
    }

    fn require_self_or_manage_users(&self, caller: &Identity, target_name: &str) -> Result<()> {
        if caller.name == target_name {
            return Ok(());
        }
        require_permission(caller, Permission::ManageUsers)
    }
}

pub(crate) fn validate_natural_key(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{what} must not be empty")));
    }
    Ok(())
}
