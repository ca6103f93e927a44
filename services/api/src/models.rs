//! API models for request and response payloads

use chrono::{DateTime, Utc};
use common::{Plan, User};
use serde::{Deserialize, Serialize};

/// Request for a chat completion
#[derive(Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

/// Response for a chat completion
#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub credits_remaining: i64,
}

/// Account summary for the current user
#[derive(Serialize)]
pub struct ProfileResponse {
    pub email: String,
    pub plan: Plan,
    pub credits: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            plan: user.plan,
            credits: user.credits,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Query parameters for usage history
#[derive(Deserialize)]
pub struct UsageQuery {
    pub limit: Option<i64>,
}
