use actix_web::{HttpResponse, Result, web};
use validator::Validate;

use auth_services::middleware::AuthenticatedUser;
use booking_engine::{BookingEngine, BookingError, DateInterval, RequestStore};

use crate::request_types::*;

/// Submits a new rental request as the authenticated user
pub async fn create_request(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    body: web::Json<CreateRentalRequestBody>,
) -> Result<HttpResponse, RequestApiError> {
    body.validate()
        .map_err(|e| RequestApiError::Validation(format!("Validation error: {}", e)))?;

    let request = engine
        .create_request(
            body.listing_id,
            user.0,
            body.start_date,
            body.end_date,
            body.total_price,
        )
        .await?;

    Ok(HttpResponse::Created().json(RentalRequestResponse::from(request)))
}

/// Approves a pending request as the listing owner
pub async fn approve_request(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    path: web::Path<uuid::Uuid>,
) -> Result<HttpResponse, RequestApiError> {
    let request_id = path.into_inner();
    let request = engine.approve_request(request_id, user.0).await?;

    Ok(HttpResponse::Ok().json(RentalRequestResponse::from(request)))
}

/// Rejects a pending request as the listing owner
pub async fn reject_request(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    path: web::Path<uuid::Uuid>,
    body: web::Json<DecisionBody>,
) -> Result<HttpResponse, RequestApiError> {
    body.validate()
        .map_err(|e| RequestApiError::Validation(format!("Validation error: {}", e)))?;

    let request_id = path.into_inner();
    let request = engine
        .reject_request(request_id, user.0, body.reason.clone())
        .await?;

    Ok(HttpResponse::Ok().json(RentalRequestResponse::from(request)))
}

/// Cancels a pending or approved request as either party
pub async fn cancel_request(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    path: web::Path<uuid::Uuid>,
    body: web::Json<DecisionBody>,
) -> Result<HttpResponse, RequestApiError> {
    body.validate()
        .map_err(|e| RequestApiError::Validation(format!("Validation error: {}", e)))?;

    let request_id = path.into_inner();
    let request = engine
        .cancel_request(request_id, user.0, body.reason.clone())
        .await?;

    Ok(HttpResponse::Ok().json(RentalRequestResponse::from(request)))
}

/// Gets a specific rental request, visible only to its two parties
pub async fn get_request(
    pool: web::Data<sqlx::PgPool>,
    user: AuthenticatedUser,
    path: web::Path<uuid::Uuid>,
) -> Result<HttpResponse, RequestApiError> {
    let request_id = path.into_inner();
    let store = RequestStore::new(pool.get_ref().clone());
    let request = store.get_by_id(&request_id).await?;

    if request.requester_id != user.0 && request.owner_id != user.0 {
        return Err(RequestApiError::Booking(BookingError::Forbidden));
    }

    Ok(HttpResponse::Ok().json(RentalRequestResponse::from(request)))
}

/// Gets the requests the authenticated user has submitted
pub async fn get_sent_requests(
    pool: web::Data<sqlx::PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, RequestApiError> {
    let store = RequestStore::new(pool.get_ref().clone());
    let requests = store.list_for_requester(&user.0).await?;

    let requests: Vec<RentalRequestResponse> =
        requests.into_iter().map(RentalRequestResponse::from).collect();

    Ok(HttpResponse::Ok().json(ListRequestsResponse {
        total: requests.len() as i64,
        requests,
    }))
}

/// Gets the requests submitted against the authenticated user's listings
pub async fn get_received_requests(
    pool: web::Data<sqlx::PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, RequestApiError> {
    let store = RequestStore::new(pool.get_ref().clone());
    let requests = store.list_for_owner(&user.0).await?;

    let requests: Vec<RentalRequestResponse> =
        requests.into_iter().map(RentalRequestResponse::from).collect();

    Ok(HttpResponse::Ok().json(ListRequestsResponse {
        total: requests.len() as i64,
        requests,
    }))
}

/// Gets the approved bookings of a listing within a date window, for
/// availability calendars. Public: exposes dates only, never the parties.
pub async fn get_booked_dates(
    pool: web::Data<sqlx::PgPool>,
    path: web::Path<uuid::Uuid>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, RequestApiError> {
    let listing_id = path.into_inner();
    let window = DateInterval::new(query.start_date, query.end_date)
        .ok_or(BookingError::InvalidInterval)?;

    let store = RequestStore::new(pool.get_ref().clone());
    let booked = store
        .approved_overlapping(&listing_id, &window)
        .await?
        .into_iter()
        .map(|request| BookedInterval {
            start_date: request.interval.start,
            end_date: request.interval.end,
        })
        .collect();

    Ok(HttpResponse::Ok().json(BookedDatesResponse { listing_id, booked }))
}
