//! # Postgres
//!
//! This crate provides a client for the rental marketplace backend to interact with a PostgreSQL database.

/// Database client for the rental marketplace backend.
pub mod database;
