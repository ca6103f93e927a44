//! Integration tests for the PostgreSQL store
//!
//! These tests need a reachable PostgreSQL instance (see `DATABASE_URL`) and
//! are ignored by default. Run them with `cargo test -- --ignored`.

use std::sync::Arc;

use common::{
    NewUser, Plan, StoreError, UsageLimiter,
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    store::{PgStore, UserStore},
};
use uuid::Uuid;

async fn store() -> Result<PgStore, Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    let pool = init_pool(&config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");
    run_migrations(&pool).await?;
    Ok(PgStore::new(pool))
}

fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_duplicate_registration_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let store = store().await?;
    let email = unique_email();

    let first = store
        .insert_user(NewUser {
            email: email.clone(),
            password_hash: "first".to_string(),
            plan: Plan::Free,
        })
        .await?;

    let second = store
        .insert_user(NewUser {
            email: email.clone(),
            password_hash: "second".to_string(),
            plan: Plan::Paid,
        })
        .await;
    assert!(matches!(second, Err(StoreError::DuplicateUser)));

    let stored = store.find_by_email(&email).await?.expect("user exists");
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.password_hash, "first");
    assert_eq!(stored.plan, Plan::Free);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_concurrent_consumption_never_goes_negative() -> Result<(), Box<dyn std::error::Error>>
{
    let store = store().await?;
    let email = unique_email();
    let user = store
        .insert_user(NewUser {
            email: email.clone(),
            password_hash: "hash".to_string(),
            plan: Plan::Free,
        })
        .await?;
    assert_eq!(user.credits, 50);

    let limiter = UsageLimiter::new(Arc::new(store.clone()), Arc::new(store.clone()));

    let handles: Vec<_> = (0..60)
        .map(|_| {
            let limiter = limiter.clone();
            let email = email.clone();
            tokio::spawn(async move { limiter.check_and_consume(&email, 1).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(StoreError::InsufficientCredits) => {}
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(successes, 50);
    let stored = store.find_by_email(&email).await?.expect("user exists");
    assert_eq!(stored.credits, 0);

    Ok(())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_rejected_consumption_is_classified() -> Result<(), Box<dyn std::error::Error>> {
    let store = store().await?;
    let email = unique_email();
    store
        .insert_user(NewUser {
            email: email.clone(),
            password_hash: "hash".to_string(),
            plan: Plan::Free,
        })
        .await?;

    assert!(matches!(
        store.consume_credits(&email, 51).await,
        Err(StoreError::InsufficientCredits)
    ));
    assert!(matches!(
        store.consume_credits(&unique_email(), 1).await,
        Err(StoreError::UserNotFound)
    ));

    store.set_active(&email, false).await?;
    assert!(matches!(
        store.consume_credits(&email, 1).await,
        Err(StoreError::AccountDisabled)
    ));

    let stored = store.find_by_email(&email).await?.expect("user exists");
    assert_eq!(stored.credits, 50);

    Ok(())
}
