//! In-process store used by tests and local experiments

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{UsageLedger, UserStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{NewUsageLog, NewUser, UsageLog, User};

/// Store keeping users and usage logs in memory
///
/// Clones share the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    usage: Arc<Mutex<Vec<UsageLog>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a user's balance
    pub async fn set_credits(&self, email: &str, credits: i64) -> StoreResult<()> {
        if credits < 0 {
            return Err(StoreError::InvalidAmount(credits));
        }
        let mut users = self.users.lock().await;
        let user = users.get_mut(email).ok_or(StoreError::UserNotFound)?;
        user.credits = credits;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut users = self.users.lock().await;
        if users.contains_key(&new_user.email) {
            return Err(StoreError::DuplicateUser);
        }

        let user = new_user.into_user();
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.lock().await.get(email).cloned())
    }

    async fn consume_credits(&self, email: &str, amount: i64) -> StoreResult<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        // The lock is held across the check and the decrement.
        let mut users = self.users.lock().await;
        let user = users.get_mut(email).ok_or(StoreError::UserNotFound)?;

        if !user.is_active {
            return Err(StoreError::AccountDisabled);
        }
        if user.credits < amount {
            return Err(StoreError::InsufficientCredits);
        }

        user.credits -= amount;
        Ok(user.credits)
    }

    async fn refund_credits(&self, email: &str, amount: i64) -> StoreResult<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let mut users = self.users.lock().await;
        let user = users.get_mut(email).ok_or(StoreError::UserNotFound)?;
        user.credits += amount;
        Ok(user.credits)
    }

    async fn set_active(&self, email: &str, active: bool) -> StoreResult<()> {
        let mut users = self.users.lock().await;
        let user = users.get_mut(email).ok_or(StoreError::UserNotFound)?;
        user.is_active = active;
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for MemoryStore {
    async fn append(&self, entry: NewUsageLog) -> StoreResult<UsageLog> {
        if entry.tokens <= 0 {
            return Err(StoreError::InvalidAmount(entry.tokens));
        }

        let log = entry.into_log();
        self.usage.lock().await.push(log.clone());
        Ok(log)
    }

    async fn recent_for_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<UsageLog>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let usage = self.usage.lock().await;

        Ok(usage
            .iter()
            .rev()
            .filter(|log| log.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
