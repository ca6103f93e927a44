//! Application state shared across handlers

use common::{TokenService, UsageLimiter, store::UserStore};
use std::sync::Arc;

use crate::assistant::Assistant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub limiter: UsageLimiter,
    pub assistant: Arc<dyn Assistant>,
}
