//! Authentication middleware for JWT token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::{TokenKind, User};
use tracing::{debug, error, warn};

use crate::{error::ApiError, state::AppState};

/// Authenticated user, resolved from the access token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Authentication middleware
///
/// Rejects the request before it reaches the handler unless it carries a
/// valid access token for an existing, active user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(|| {
        debug!("Request without bearer token");
        ApiError::Unauthorized
    })?;

    let email = state
        .tokens
        .verify_kind(bearer.token(), TokenKind::Access)
        .map_err(|_| ApiError::Unauthorized)?;

    let user = state
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| {
            error!("Failed to load user {}: {}", email, e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| {
            warn!("Valid token for unknown user {}", email);
            ApiError::Unauthorized
        })?;

    if !user.is_active {
        return Err(ApiError::Forbidden);
    }

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
