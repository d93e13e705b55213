//! # Auth Services
//!
//! This crate supplies pre-validated caller identity to the request handlers.
//! Tokens are issued by the marketplace's identity service; here they are only
//! verified and turned into an actor id.

/// JWT token verification.
pub mod jwt;
/// Middleware for request authentication.
pub mod middleware;
/// Types and structures used in authentication.
pub mod types;
