//! # Listings
//!
//! This crate provides the booking engine's view of the listing catalog.
//! The catalog itself (creation, editing, photos, search) is managed elsewhere;
//! the booking engine only needs to resolve a listing to its owner.

/// Listing directory trait and Postgres-backed implementation.
mod directory;
pub use directory::*;
