//! Registration and password authentication over the user store

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::{
    NewUser, Plan, StoreError, User,
    models::normalize_email,
    store::UserStore,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::validation::{validate_email, validate_password};

/// Errors from registration and login
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    DuplicateUser,

    /// Unknown email or wrong password; the two are not distinguished
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Credential store: hashes passwords and checks them against stored users
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    hasher: Argon2<'static>,
    /// Verified against when the email is unknown, so both failure paths hash
    dummy_hash: Arc<str>,
}

impl CredentialStore {
    /// Create a credential store with default Argon2 parameters
    pub fn new(users: Arc<dyn UserStore>) -> Result<Self, CredentialError> {
        Self::with_hasher(users, Argon2::default())
    }

    /// Create a credential store with a specific Argon2 instance
    pub fn with_hasher(
        users: Arc<dyn UserStore>,
        hasher: Argon2<'static>,
    ) -> Result<Self, CredentialError> {
        let dummy_hash = hash_password(&hasher, "dummy password for unknown users")?;
        Ok(Self {
            users,
            hasher,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Register a new user on the free plan
    pub async fn register(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        let email = normalize_email(email);
        validate_email(&email).map_err(CredentialError::Validation)?;
        validate_password(password).map_err(CredentialError::Validation)?;

        let password_hash = hash_password(&self.hasher, password)?;

        let user = self
            .users
            .insert_user(NewUser {
                email,
                password_hash,
                plan: Plan::default(),
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateUser => CredentialError::DuplicateUser,
                other => other.into(),
            })?;

        info!("Registered user {} on plan {}", user.email, user.plan);
        Ok(user)
    }

    /// Check an email/password pair and return the matching user
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            // Burn the same hashing work as a real check.
            let _ = self.verify_password(&self.dummy_hash, password);
            return Err(CredentialError::InvalidCredentials);
        };

        if !self.verify_password(&user.password_hash, password)? {
            return Err(CredentialError::InvalidCredentials);
        }

        if !user.is_active {
            warn!("Login refused for disabled account {}", user.email);
            return Err(CredentialError::AccountDisabled);
        }

        Ok(user)
    }

    /// Look up an active user by email, e.g. when refreshing a session
    pub async fn active_user(&self, email: &str) -> Result<User, CredentialError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(CredentialError::InvalidCredentials)?;

        if !user.is_active {
            return Err(CredentialError::AccountDisabled);
        }
        Ok(user)
    }

    fn verify_password(
        &self,
        password_hash: &str,
        password: &str,
    ) -> Result<bool, CredentialError> {
        let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
            StoreError::PasswordHash(format!("Failed to parse password hash: {}", e))
        })?;

        Ok(self
            .hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

fn hash_password(hasher: &Argon2<'static>, password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = hasher
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::PasswordHash(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}
