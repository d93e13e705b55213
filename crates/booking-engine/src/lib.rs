//! # Booking Engine
//!
//! This crate implements the rental-request booking engine for the marketplace:
//! accepting date-range requests against a listing, deciding which requests may
//! coexist, enforcing mutual exclusion between overlapping approved bookings,
//! and notifying the affected parties of every outcome.

/// Closed calendar-date intervals and their overlap predicates
mod interval;
pub use interval::*;

/// Rental request records, statuses, events, errors, and configuration
mod booking_types;
pub use booking_types::*;

/// Persistent store operations for rental request rows
mod store;
pub use store::*;

/// Partitioning of competing requests by status
mod conflicts;
pub use conflicts::*;

/// Pure transition guards of the booking state machine
mod transitions;
pub use transitions::*;

/// Orchestration of transactional booking operations
mod engine;
pub use engine::*;

/// Best-effort notification dispatch after committed transitions
mod notification_service;
pub use notification_service::*;
