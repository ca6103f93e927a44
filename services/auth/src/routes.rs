//! Authentication service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use common::{Plan, TokenKind, models::normalize_email};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{AppState, credentials::CredentialError};

/// Request for registration and login
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Response for registration
#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
    pub plan: Plan,
    pub credits: i64,
}

/// Response for login
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub plan: Plan,
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Response for token refresh
#[derive(Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Registration attempt for {}", payload.email);

    let user = state
        .credentials
        .register(&payload.email, &payload.password)
        .await?;

    let response = RegisterResponse {
        message: "registered".to_string(),
        email: user.email,
        plan: user.plan,
        credits: user.credits,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let key = normalize_email(&payload.email);
    info!("Login attempt for {}", key);

    if !state.rate_limiter.is_allowed(&key).await {
        warn!("Login throttled for {}", key);
        return Err(AuthError::TooManyAttempts);
    }

    let user = match state
        .credentials
        .authenticate(&payload.email, &payload.password)
        .await
    {
        Ok(user) => user,
        Err(CredentialError::InvalidCredentials) => {
            state.rate_limiter.record_failure(&key).await;
            return Err(AuthError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };
    state.rate_limiter.reset(&key).await;

    let access_token = issue(&state, &user.email, TokenKind::Access)?;
    let refresh_token = issue(&state, &user.email, TokenKind::Refresh)?;

    let response = TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_token_expiry(),
        plan: user.plan,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Exchange a refresh token for a new access token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Token refresh request");

    let subject = state
        .tokens
        .verify_kind(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|_| AuthError::InvalidToken)?;

    let user = state
        .credentials
        .active_user(&subject)
        .await
        .map_err(|e| match e {
            CredentialError::InvalidCredentials => AuthError::InvalidToken,
            other => other.into(),
        })?;

    let response = RefreshTokenResponse {
        access_token: issue(&state, &user.email, TokenKind::Access)?,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_token_expiry(),
    };

    Ok((StatusCode::OK, Json(response)))
}

fn issue(state: &AppState, subject: &str, kind: TokenKind) -> Result<String, AuthError> {
    state.tokens.issue(subject, kind).map_err(|e| {
        error!("Failed to generate {:?} token: {}", kind, e);
        AuthError::InternalServerError
    })
}

/// Custom error type for authentication errors
#[derive(Debug)]
pub enum AuthError {
    BadRequest(String),
    DuplicateUser,
    InvalidCredentials,
    InvalidToken,
    AccountDisabled,
    TooManyAttempts,
    InternalServerError,
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Validation(msg) => AuthError::BadRequest(msg),
            CredentialError::DuplicateUser => AuthError::DuplicateUser,
            CredentialError::InvalidCredentials => AuthError::InvalidCredentials,
            CredentialError::AccountDisabled => AuthError::AccountDisabled,
            CredentialError::Store(e) => {
                error!("Credential store failure: {}", e);
                AuthError::InternalServerError
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::DuplicateUser => (StatusCode::CONFLICT, "User already exists".to_string()),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            AuthError::AccountDisabled => {
                (StatusCode::FORBIDDEN, "Account is disabled".to_string())
            }
            AuthError::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts".to_string(),
            ),
            AuthError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credentials::{CredentialStore, tests::test_hasher},
        rate_limiter::{RateLimiter, RateLimiterConfig},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use common::{
        JwtConfig, TokenService,
        jwt::Algorithm,
        store::{MemoryStore, UserStore},
    };
    use serde_json::{Value, json};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn app() -> (MemoryStore, TokenService, Router) {
        let store = MemoryStore::new();
        let config = JwtConfig::new("route-test-secret", Algorithm::HS256, 30, 7).unwrap();
        let tokens = TokenService::new(&config).unwrap();
        let state = AppState {
            credentials: CredentialStore::with_hasher(Arc::new(store.clone()), test_hasher())
                .unwrap(),
            tokens: tokens.clone(),
            rate_limiter: RateLimiter::new(RateLimiterConfig {
                max_attempts: 3,
                window: Duration::from_secs(60),
                lockout: Duration::from_secs(60),
            }),
        };
        (store, tokens, create_router(state))
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn register(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
        post(
            app,
            "/auth/register",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    #[tokio::test]
    async fn register_then_login_issues_both_tokens() {
        let (_store, tokens, app) = app();

        let (status, body) = register(&app, "alice@example.com", "password1").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["plan"], "free");
        assert_eq!(body["credits"], 50);

        let (status, body) = post(
            &app,
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "password1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 1800);
        assert_eq!(body["plan"], "free");

        let access = body["access_token"].as_str().unwrap();
        let refresh = body["refresh_token"].as_str().unwrap();
        assert_eq!(
            tokens.verify_kind(access, TokenKind::Access).unwrap(),
            "alice@example.com"
        );
        assert_eq!(
            tokens.verify_kind(refresh, TokenKind::Refresh).unwrap(),
            "alice@example.com"
        );
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (_store, _tokens, app) = app();

        register(&app, "alice@example.com", "password1").await;
        let (status, body) = register(&app, "alice@example.com", "password2").await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User already exists");
    }

    #[tokio::test]
    async fn login_failures_look_the_same() {
        let (_store, _tokens, app) = app();
        register(&app, "alice@example.com", "password1").await;

        let wrong_password = post(
            &app,
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "password2" }),
        )
        .await;
        let unknown_email = post(
            &app,
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": "password1" }),
        )
        .await;

        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, unknown_email);
    }

    #[tokio::test]
    async fn repeated_failures_are_throttled() {
        let (_store, _tokens, app) = app();
        register(&app, "alice@example.com", "password1").await;

        for _ in 0..3 {
            let (status, _) = post(
                &app,
                "/auth/login",
                json!({ "email": "alice@example.com", "password": "wrong-pass1" }),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, _) = post(
            &app,
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "password1" }),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn refresh_issues_new_access_token() {
        let (_store, tokens, app) = app();
        register(&app, "alice@example.com", "password1").await;
        let refresh = tokens.issue("alice@example.com", TokenKind::Refresh).unwrap();

        let (status, body) = post(
            &app,
            "/auth/refresh",
            json!({ "refresh_token": refresh }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let access = body["access_token"].as_str().unwrap();
        assert_eq!(
            tokens.verify_kind(access, TokenKind::Access).unwrap(),
            "alice@example.com"
        );
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_and_unknown_users() {
        let (store, tokens, app) = app();
        register(&app, "alice@example.com", "password1").await;

        let access = tokens.issue("alice@example.com", TokenKind::Access).unwrap();
        let (status, _) = post(&app, "/auth/refresh", json!({ "refresh_token": access })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let ghost = tokens.issue("ghost@example.com", TokenKind::Refresh).unwrap();
        let (status, _) = post(&app, "/auth/refresh", json!({ "refresh_token": ghost })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        store.set_active("alice@example.com", false).await.unwrap();
        let refresh = tokens.issue("alice@example.com", TokenKind::Refresh).unwrap();
        let (status, _) = post(&app, "/auth/refresh", json!({ "refresh_token": refresh })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn bad_registration_input_is_a_bad_request() {
        let (_store, _tokens, app) = app();

        let (status, body) = register(&app, "not-an-email", "password1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email format");
    }
}
