use booking_engine::{BookingError, RentalRequest, RequestStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request body for submitting a new rental request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRentalRequestBody {
    /// Listing to rent
    pub listing_id: Uuid,

    /// First rental day
    pub start_date: NaiveDate,

    /// Last rental day, inclusive
    pub end_date: NaiveDate,

    /// Total price computed by the pricing layer
    #[validate(range(min = 0.0, message = "Total price cannot be negative"))]
    pub total_price: f64,
}

/// Request body for rejecting or canceling a request
#[derive(Debug, Deserialize, Validate)]
pub struct DecisionBody {
    /// Optional free-text reason shown to the counterparty
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

/// A rental request as returned to API clients
#[derive(Debug, Serialize)]
pub struct RentalRequestResponse {
    /// Unique identifier of the request
    pub id: Uuid,
    /// Listing being rented
    pub listing_id: Uuid,
    /// Party asking to rent
    pub requester_id: Uuid,
    /// Listing owner
    pub owner_id: Uuid,
    /// First rental day
    pub start_date: NaiveDate,
    /// Last rental day, inclusive
    pub end_date: NaiveDate,
    /// Current lifecycle state
    pub status: RequestStatus,
    /// Total price of the rental
    pub total_price: f64,
    /// Reason recorded on rejection
    pub rejection_reason: Option<String>,
    /// Reason recorded on cancellation
    pub cancellation_reason: Option<String>,
    /// Party who canceled
    pub canceled_by: Option<Uuid>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When the request last changed state
    pub updated_at: DateTime<Utc>,
}

impl From<RentalRequest> for RentalRequestResponse {
    fn from(request: RentalRequest) -> Self {
        Self {
            id: request.id,
            listing_id: request.listing_id,
            requester_id: request.requester_id,
            owner_id: request.owner_id,
            start_date: request.interval.start,
            end_date: request.interval.end,
            status: request.status,
            total_price: request.total_price,
            rejection_reason: request.rejection_reason,
            cancellation_reason: request.cancellation_reason,
            canceled_by: request.canceled_by,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Response structure for listing a user's requests
#[derive(Debug, Serialize)]
pub struct ListRequestsResponse {
    /// The requests, newest first
    pub requests: Vec<RentalRequestResponse>,
    /// Total count
    pub total: i64,
}

/// Query parameters for a listing's availability window
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// First day of the window
    pub start_date: NaiveDate,
    /// Last day of the window, inclusive
    pub end_date: NaiveDate,
}

/// A booked span within an availability window
#[derive(Debug, Serialize)]
pub struct BookedInterval {
    /// First booked day
    pub start_date: NaiveDate,
    /// Last booked day, inclusive
    pub end_date: NaiveDate,
}

/// Response structure for a listing's booked dates
#[derive(Debug, Serialize)]
pub struct BookedDatesResponse {
    /// The listing the window was queried for
    pub listing_id: Uuid,
    /// Approved bookings overlapping the window
    pub booked: Vec<BookedInterval>,
}

/// Custom error type for rental request endpoints
#[derive(thiserror::Error, Debug)]
pub enum RequestApiError {
    /// Request body failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from the booking engine
    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl actix_web::ResponseError for RequestApiError {
    fn error_response(&self) -> actix_web::HttpResponse {
        use actix_web::HttpResponse;

        match self {
            RequestApiError::Validation(msg) => HttpResponse::BadRequest().json(
                serde_json::json!({ "error": "validation_error", "message": msg }),
            ),
            RequestApiError::Booking(err) => match err {
                BookingError::InvalidInterval => HttpResponse::BadRequest().json(
                    serde_json::json!({ "error": "invalid_interval", "message": err.to_string() }),
                ),
                BookingError::SelfBookingNotAllowed => HttpResponse::BadRequest().json(
                    serde_json::json!({ "error": "self_booking_not_allowed", "message": err.to_string() }),
                ),
                BookingError::NotFound => HttpResponse::NotFound().json(
                    serde_json::json!({ "error": "request_not_found", "message": err.to_string() }),
                ),
                BookingError::ListingNotFound => HttpResponse::NotFound().json(
                    serde_json::json!({ "error": "listing_not_found", "message": err.to_string() }),
                ),
                BookingError::Forbidden => HttpResponse::Forbidden().json(
                    serde_json::json!({ "error": "forbidden", "message": err.to_string() }),
                ),
                BookingError::InvalidTransition { .. } => HttpResponse::Conflict().json(
                    serde_json::json!({ "error": "invalid_transition", "message": err.to_string() }),
                ),
                BookingError::DateConflict => HttpResponse::Conflict().json(
                    serde_json::json!({ "error": "date_conflict", "message": err.to_string() }),
                ),
                BookingError::RentalAlreadyStarted => HttpResponse::Conflict().json(
                    serde_json::json!({ "error": "rental_already_started", "message": err.to_string() }),
                ),
                BookingError::Timeout => HttpResponse::GatewayTimeout().json(
                    serde_json::json!({ "error": "timeout", "message": err.to_string() }),
                ),
                BookingError::Database(_) | BookingError::DataFormat(_) => {
                    HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": "store_unavailable",
                        "message": "An internal error occurred"
                    }))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    fn status_for(err: BookingError) -> StatusCode {
        RequestApiError::from(err).error_response().status()
    }

    #[test]
    fn business_errors_map_to_conventional_statuses() {
        assert_eq!(status_for(BookingError::InvalidInterval), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(BookingError::SelfBookingNotAllowed),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(BookingError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(BookingError::ListingNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(BookingError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(BookingError::DateConflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(BookingError::RentalAlreadyStarted),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(BookingError::InvalidTransition {
                current: RequestStatus::Rejected,
                action: "approved",
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn infrastructure_errors_hide_detail() {
        let response = RequestApiError::from(BookingError::Timeout).error_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response =
            RequestApiError::from(BookingError::DataFormat("bad row".to_string())).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn negative_price_fails_validation() {
        let body = CreateRentalRequestBody {
            listing_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
            total_price: -10.0,
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn oversized_reason_fails_validation() {
        let body = DecisionBody {
            reason: Some("x".repeat(501)),
        };
        assert!(body.validate().is_err());

        let body = DecisionBody { reason: None };
        assert!(body.validate().is_ok());
    }

    #[test]
    fn response_flattens_the_interval() {
        use booking_engine::DateInterval;

        let request = RentalRequest {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            interval: DateInterval::new(
                NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
            )
            .unwrap(),
            status: RequestStatus::Pending,
            total_price: 99.5,
            rejection_reason: None,
            cancellation_reason: None,
            canceled_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response = RentalRequestResponse::from(request.clone());
        assert_eq!(response.start_date, request.interval.start);
        assert_eq!(response.end_date, request.interval.end);
        assert_eq!(response.status, RequestStatus::Pending);
    }
}
