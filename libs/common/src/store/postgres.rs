//! PostgreSQL-backed credential store and usage ledger

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use super::{UsageLedger, UserStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{NewUsageLog, NewUser, UsageLog, User};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Work out why a conditional credit update matched no row
    async fn explain_rejected_consume(&self, email: &str) -> StoreError {
        let row = sqlx::query("SELECT is_active FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(None) => StoreError::UserNotFound,
            Ok(Some(row)) => match row.try_get::<bool, _>("is_active") {
                Ok(false) => StoreError::AccountDisabled,
                Ok(true) => StoreError::InsufficientCredits,
                Err(e) => e.into(),
            },
            Err(e) => e.into(),
        }
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let plan: String = row.try_get("plan")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        plan: plan.parse()?,
        credits: row.try_get("credits")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn usage_from_row(row: &PgRow) -> StoreResult<UsageLog> {
    Ok(UsageLog {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        action: row.try_get("action")?,
        tokens: row.try_get("tokens")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, new_user: NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.email);

        let user = new_user.into_user();

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, plan, credits, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, plan, credits, is_active, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.plan.as_str())
        .bind(user.credits)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(StoreError::DuplicateUser),
        }
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, plan, credits, is_active, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn consume_credits(&self, email: &str, amount: i64) -> StoreResult<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        // Check and decrement in one statement so concurrent callers
        // cannot both pass against the same balance.
        let row = sqlx::query(
            r#"
            UPDATE users
            SET credits = credits - $2
            WHERE email = $1 AND is_active AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(email)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("credits")?),
            None => {
                let err = self.explain_rejected_consume(email).await;
                warn!("Credit consumption rejected for {}: {}", email, err);
                Err(err)
            }
        }
    }

    async fn refund_credits(&self, email: &str, amount: i64) -> StoreResult<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let row = sqlx::query(
            r#"
            UPDATE users
            SET credits = credits + $2
            WHERE email = $1
            RETURNING credits
            "#,
        )
        .bind(email)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("credits")?),
            None => Err(StoreError::UserNotFound),
        }
    }

    async fn set_active(&self, email: &str, active: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE email = $1")
            .bind(email)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for PgStore {
    async fn append(&self, entry: NewUsageLog) -> StoreResult<UsageLog> {
        if entry.tokens <= 0 {
            return Err(StoreError::InvalidAmount(entry.tokens));
        }

        let log = entry.into_log();

        let row = sqlx::query(
            r#"
            INSERT INTO usage_logs (id, user_id, action, tokens, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, action, tokens, created_at
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.action)
        .bind(log.tokens)
        .bind(log.created_at)
        .fetch_one(&self.pool)
        .await?;

        usage_from_row(&row)
    }

    async fn recent_for_user(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<UsageLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, tokens, created_at
            FROM usage_logs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(usage_from_row).collect()
    }
}
