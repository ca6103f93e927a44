//! Common library for the credit-metered access services
//!
//! This crate provides the pieces shared by the authentication and API
//! services: the account data model, the credential store, token issuing
//! and verification, credit metering, and database connectivity.

pub mod database;
pub mod error;
pub mod jwt;
pub mod models;
pub mod store;
pub mod usage;

pub use error::{DatabaseError, StoreError};
pub use jwt::{JwtConfig, TokenError, TokenKind, TokenService};
pub use models::{NewUsageLog, NewUser, Plan, UsageLog, User};
pub use usage::{Metered, UsageError, UsageLimiter};
