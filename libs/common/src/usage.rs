//! Credit metering for protected actions

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewUsageLog, UsageLog, User};
use crate::store::{UsageLedger, UserStore};

/// Errors from a metered action
#[derive(Error, Debug)]
pub enum UsageError {
    /// The action was not started
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The action ran and failed; its credits were refunded
    #[error("Metered action failed: {0}")]
    Action(#[source] anyhow::Error),
}

/// Output of a metered action
#[derive(Debug)]
pub struct Metered<T> {
    pub output: T,
    pub credits_remaining: i64,
    pub log: UsageLog,
}

/// Gatekeeper between a user's balance and the actions it pays for
#[derive(Clone)]
pub struct UsageLimiter {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn UsageLedger>,
}

impl UsageLimiter {
    pub fn new(users: Arc<dyn UserStore>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { users, ledger }
    }

    /// Take `amount` credits from the user or fail without touching the balance
    pub async fn check_and_consume(&self, email: &str, amount: i64) -> Result<i64, StoreError> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }
        self.users.consume_credits(email, amount).await
    }

    /// Pay for and run `action`, recording the usage once it succeeds
    pub async fn run_metered<T, F, Fut>(
        &self,
        user: &User,
        action: &str,
        amount: i64,
        f: F,
    ) -> Result<Metered<T>, UsageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let remaining = self.check_and_consume(&user.email, amount).await?;

        let output = match f().await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Action {} failed for {}, refunding {} credits",
                    action, user.email, amount
                );
                self.refund(&user.email, amount).await;
                return Err(UsageError::Action(e));
            }
        };

        let entry = NewUsageLog {
            user_id: user.id,
            action: action.to_string(),
            tokens: amount,
        };
        let log = match self.ledger.append(entry).await {
            Ok(log) => log,
            Err(e) => {
                error!(
                    "Failed to record {} usage for {}, refunding {} credits: {}",
                    action, user.email, amount, e
                );
                self.refund(&user.email, amount).await;
                return Err(e.into());
            }
        };

        info!(
            "User {} spent {} credits on {} ({} left)",
            user.email, amount, action, remaining
        );

        Ok(Metered {
            output,
            credits_remaining: remaining,
            log,
        })
    }

    async fn refund(&self, email: &str, amount: i64) {
        if let Err(e) = self.users.refund_credits(email, amount).await {
            error!("Failed to refund credits for {}: {}", email, e);
        }
    }

    /// Most recent usage for a user
    pub async fn history(&self, user_id: Uuid, limit: i64) -> Result<Vec<UsageLog>, StoreError> {
        self.ledger.recent_for_user(user_id, limit).await
    }
}
