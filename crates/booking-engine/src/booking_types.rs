use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::DateInterval;

/// Lifecycle state of a rental request.
///
/// `Rejected` and `Canceled` are terminal; `Approved` can only move to
/// `Canceled`; `Pending` is the sole state the owner still has to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting the owner's decision
    Pending,
    /// Accepted by the owner; holds its dates exclusively
    Approved,
    /// Declined by the owner, either directly or by a competing approval
    Rejected,
    /// Withdrawn by either party
    Canceled,
}

impl RequestStatus {
    /// Database text representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Canceled => "canceled",
        }
    }

    /// Returns true when no further transition is permitted from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Canceled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "canceled" => Ok(RequestStatus::Canceled),
            other => Err(BookingError::DataFormat(format!(
                "unknown request status '{}'",
                other
            ))),
        }
    }
}

/// A rental request: a proposed booking of a listing for a date interval,
/// owned by a requester and decided by the listing owner.
#[derive(Debug, Clone, Serialize)]
pub struct RentalRequest {
    /// Unique identifier, assigned at creation
    pub id: Uuid,
    /// Listing being rented
    pub listing_id: Uuid,
    /// Party asking to rent
    pub requester_id: Uuid,
    /// Listing owner at creation time; decides approve/reject
    pub owner_id: Uuid,
    /// Requested rental days, immutable after creation
    pub interval: DateInterval,
    /// Current lifecycle state
    pub status: RequestStatus,
    /// Total charged for the rental, computed by the caller at creation
    pub total_price: f64,
    /// Reason recorded when the request was rejected
    pub rejection_reason: Option<String>,
    /// Reason recorded when the request was canceled
    pub cancellation_reason: Option<String>,
    /// Party who triggered the cancellation
    pub canceled_by: Option<Uuid>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When the request last changed state
    pub updated_at: DateTime<Utc>,
}

/// State change announced to the affected counterparty.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// A new request was submitted against the recipient's listing
    RequestCreated,
    /// The recipient's request was approved by the listing owner
    RequestApproved,
    /// The recipient's request was rejected
    RequestRejected {
        /// Why the request was rejected, when the owner gave a reason
        reason: Option<String>,
    },
    /// A request involving the recipient was canceled
    RequestCanceled {
        /// Party who canceled
        canceled_by: Uuid,
        /// Optional free-text reason
        reason: Option<String>,
    },
}

/// Errors produced by booking operations.
#[derive(thiserror::Error, Debug)]
pub enum BookingError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Start date after end date
    #[error("Invalid interval: start date is after end date")]
    InvalidInterval,

    /// Requester owns the listing
    #[error("Owners cannot rent their own listing")]
    SelfBookingNotAllowed,

    /// Rental request not found
    #[error("Rental request not found")]
    NotFound,

    /// Listing not found
    #[error("Listing not found")]
    ListingNotFound,

    /// Actor is not a party entitled to this action
    #[error("Not allowed to perform this action on the request")]
    Forbidden,

    /// Current status does not permit the requested action
    #[error("Request is {current} and cannot be {action}")]
    InvalidTransition {
        /// Status the request currently holds
        current: RequestStatus,
        /// Action that was attempted, past tense
        action: &'static str,
    },

    /// An approved request already covers part of the dates
    #[error("An approved request already covers part of these dates")]
    DateConflict,

    /// Cancellation attempted after the rental started
    #[error("The rental has already started and can no longer be canceled")]
    RentalAlreadyStarted,

    /// Transaction exceeded its time bound
    #[error("Booking operation timed out")]
    Timeout,

    /// Stored row could not be interpreted
    #[error("Invalid data in store: {0}")]
    DataFormat(String),
}

impl From<listings::ListingError> for BookingError {
    fn from(err: listings::ListingError) -> Self {
        match err {
            listings::ListingError::NotFound => BookingError::ListingNotFound,
            listings::ListingError::Database(e) => BookingError::Database(e),
        }
    }
}

/// Tunables for the booking engine.
#[derive(Debug, Clone)]
pub struct BookingEngineConfig {
    /// Upper bound on a single booking transaction (default: 10 seconds).
    /// On elapse the transaction aborts with no partial effect.
    pub transaction_timeout: Duration,
}

impl Default for BookingEngineConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(10),
        }
    }
}

/// Tunables for notification delivery.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Delivery attempts per channel before recording a failure (default: 3)
    pub max_attempts: u32,

    /// Base delay between attempts; grows linearly per attempt (default: 2 seconds)
    pub retry_backoff: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_text_is_a_data_error() {
        let err = "paused".parse::<RequestStatus>().unwrap_err();
        assert!(matches!(err, BookingError::DataFormat(_)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Canceled.is_terminal());
    }
}
