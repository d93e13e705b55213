//! # Web Handlers for the Rental Marketplace Booking API
//!
//! This crate provides the HTTP handlers for rental request operations.

/// Handlers for rental request API endpoints
mod request_handlers;
pub use request_handlers::*;

/// Request/response types for rental request endpoints
mod request_types;
pub use request_types::*;
