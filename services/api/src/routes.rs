//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{CurrentUser, auth_middleware},
    models::{ChatRequest, ChatResponse, ProfileResponse, UsageQuery},
};

/// Credits charged per chat call
pub const CHAT_COST: i64 = 1;

const MAX_PROMPT_CHARS: usize = 8_000;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/chat", post(chat))
        .route("/me", get(profile))
        .route("/usage", get(usage_history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Metered chat endpoint
pub async fn chat(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("Prompt must not be empty".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Prompt must be at most {} characters long",
            MAX_PROMPT_CHARS
        )));
    }

    info!("Chat request from {} on plan {}", user.email, user.plan);

    let metered = state
        .limiter
        .run_metered(&user, "chat", CHAT_COST, || state.assistant.respond(prompt))
        .await?;

    Ok(Json(ChatResponse {
        response: metered.output,
        credits_remaining: metered.credits_remaining,
    }))
}

/// Current user's account summary
pub async fn profile(Extension(CurrentUser(user)): Extension<CurrentUser>) -> impl IntoResponse {
    Json(ProfileResponse::from(user))
}

/// Current user's recent metered actions, newest first
pub async fn usage_history(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let logs = state.limiter.history(user.id, limit).await?;
    Ok(Json(logs))
}
