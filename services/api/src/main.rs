use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod assistant;
mod error;
mod middleware;
mod models;
mod routes;
mod state;

use common::{
    JwtConfig, TokenService, UsageLimiter,
    database::{self, DatabaseConfig},
    store::PgStore,
};

use crate::{assistant::EchoAssistant, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting API service");

    // Tokens are verified with the same secret the auth service signs with
    let jwt_config = JwtConfig::from_env()?;
    let tokens = TokenService::new(&jwt_config)?;

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
        users: store.clone(),
        tokens,
        limiter: UsageLimiter::new(store.clone(), store),
        assistant: Arc::new(EchoAssistant),
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    info!("API service listening on 0.0.0.0:3001");

    axum::serve(listener, app).await?;

    Ok(())
}
