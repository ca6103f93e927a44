use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod credentials;
mod rate_limiter;
mod routes;
mod validation;

use common::{
    JwtConfig, TokenService,
    database::{self, DatabaseConfig},
    store::PgStore,
};

use crate::{
    credentials::CredentialStore,
    rate_limiter::{RateLimiter, RateLimiterConfig},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    // Signing configuration is read once and never changes while running
    let jwt_config = JwtConfig::from_env()?;
    let tokens = TokenService::new(&jwt_config)?;
    info!(
        "Token lifetimes: access {} min, refresh {} days",
        jwt_config.access_token_expiry_minutes, jwt_config.refresh_token_expiry_days
    );

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let app_state = AppState {
        credentials: CredentialStore::new(store)?,
        tokens,
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Authentication service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
