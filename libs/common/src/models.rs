//! Account and usage models shared by the services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StoreError;

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Paid,
}

impl Plan {
    /// Credits granted to a new account on this plan
    pub fn default_credits(self) -> i64 {
        match self {
            Plan::Free => 50,
            Plan::Paid => 1000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Paid => "paid",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "paid" => Ok(Plan::Paid),
            other => Err(StoreError::UnknownPlan(other.to_string())),
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub plan: Plan,
    pub credits: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// New user creation payload; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub plan: Plan,
}

impl NewUser {
    /// Materialize the row that will be stored, with the plan's default credits
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            credits: self.plan.default_credits(),
            email: self.email,
            password_hash: self.password_hash,
            plan: self.plan,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// One metered action, recorded after it completed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub tokens: i64,
    pub created_at: DateTime<Utc>,
}

/// Usage log creation payload
#[derive(Debug, Clone)]
pub struct NewUsageLog {
    pub user_id: Uuid,
    pub action: String,
    pub tokens: i64,
}

impl NewUsageLog {
    pub fn into_log(self) -> UsageLog {
        UsageLog {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            action: self.action,
            tokens: self.tokens,
            created_at: Utc::now(),
        }
    }
}

/// Lowercase and trim an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
