//! Credential store and usage ledger
//!
//! Both traits are implemented by [`PgStore`] for production and by
//! [`MemoryStore`] for tests and local experiments. Credit consumption is
//! atomic in both: a failed consume never changes the balance.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{NewUsageLog, NewUser, UsageLog, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistent account storage
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user; fails with `DuplicateUser` if the email is taken
    async fn insert_user(&self, new_user: NewUser) -> StoreResult<User>;

    /// Find a user by (normalized) email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Atomically subtract `amount` credits and return the remaining balance.
    ///
    /// Fails with `InsufficientCredits`, `AccountDisabled` or `UserNotFound`
    /// without mutating anything.
    async fn consume_credits(&self, email: &str, amount: i64) -> StoreResult<i64>;

    /// Give back `amount` credits and return the new balance
    async fn refund_credits(&self, email: &str, amount: i64) -> StoreResult<i64>;

    /// Enable or disable an account
    async fn set_active(&self, email: &str, active: bool) -> StoreResult<()>;
}

/// Append-only usage audit trail
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Record one completed metered action
    async fn append(&self, entry: NewUsageLog) -> StoreResult<UsageLog>;

    /// Most recent entries for a user, newest first
    async fn recent_for_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<UsageLog>>;
}
