//! # API Shared
//!
//! Shared utilities for the consultation APIs.
//!
//! Contains:
//! - `HealthService` and its response type
//! - Bearer-token identity: verifier trait, JWKS verifier and the axum middleware that guards
//!   protected routes
//!
//! Used by `api-rest`; kept separate so another API surface can reuse the same identity layer.

pub mod auth;
pub mod health;

pub use auth::{
    require_bearer, AuthError, AuthenticatedIdentity, DenyAllVerifier, JwksVerifier,
    SharedVerifier, TokenVerifier,
};
pub use health::{HealthRes, HealthService};
