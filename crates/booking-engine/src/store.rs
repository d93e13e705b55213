use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::booking_types::{BookingError, RentalRequest, RequestStatus};
use crate::interval::DateInterval;

const REQUEST_COLUMNS: &str = "id, listing_id, requester_id, owner_id, start_date, end_date, \
     status, total_price, rejection_reason, cancellation_reason, canceled_by, \
     created_at, updated_at";

/// Field values for a request row about to be inserted.
#[derive(Debug)]
pub struct NewRequest {
    /// Listing being rented
    pub listing_id: Uuid,
    /// Party asking to rent
    pub requester_id: Uuid,
    /// Listing owner, resolved from the catalog at creation time
    pub owner_id: Uuid,
    /// Requested rental days
    pub interval: DateInterval,
    /// Total charged, computed by the caller
    pub total_price: f64,
}

/// Auxiliary fields written together with a status change.
#[derive(Debug, Default)]
pub struct TransitionFields<'a> {
    /// Reason recorded on rejection
    pub rejection_reason: Option<&'a str>,
    /// Reason recorded on cancellation
    pub cancellation_reason: Option<&'a str>,
    /// Party who triggered a cancellation
    pub canceled_by: Option<Uuid>,
}

fn request_from_row(row: &PgRow) -> Result<RentalRequest, BookingError> {
    let start: NaiveDate = row.get("start_date");
    let end: NaiveDate = row.get("end_date");
    let interval = DateInterval::new(start, end).ok_or_else(|| {
        BookingError::DataFormat(format!("inverted interval {} > {} in store", start, end))
    })?;
    let status: RequestStatus = row.get::<String, _>("status").parse()?;

    Ok(RentalRequest {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        requester_id: row.get("requester_id"),
        owner_id: row.get("owner_id"),
        interval,
        status,
        total_price: row.get("total_price"),
        rejection_reason: row.get("rejection_reason"),
        cancellation_reason: row.get("cancellation_reason"),
        canceled_by: row.get("canceled_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn status_array(statuses: &[RequestStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Inserts a new pending request and returns the stored row.
pub async fn insert(
    conn: &mut PgConnection,
    new_request: &NewRequest,
) -> Result<RentalRequest, BookingError> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO rental_requests (
            listing_id, requester_id, owner_id, start_date, end_date, total_price
        ) VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {REQUEST_COLUMNS}
        "#,
    ))
    .bind(new_request.listing_id)
    .bind(new_request.requester_id)
    .bind(new_request.owner_id)
    .bind(new_request.interval.start)
    .bind(new_request.interval.end)
    .bind(new_request.total_price)
    .fetch_one(&mut *conn)
    .await?;

    request_from_row(&row)
}

/// Fetches a request by id.
pub async fn fetch(conn: &mut PgConnection, id: &Uuid) -> Result<RentalRequest, BookingError> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM rental_requests WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => request_from_row(&row),
        None => Err(BookingError::NotFound),
    }
}

/// Fetches a request by id and locks its row for the rest of the transaction.
pub async fn lock(conn: &mut PgConnection, id: &Uuid) -> Result<RentalRequest, BookingError> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM rental_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => request_from_row(&row),
        None => Err(BookingError::NotFound),
    }
}

/// Returns the listing's requests in the given statuses whose intervals
/// overlap `interval`, excluding `exclude` if present.
pub async fn fetch_overlapping(
    conn: &mut PgConnection,
    listing_id: &Uuid,
    interval: &DateInterval,
    exclude: Option<Uuid>,
    statuses: &[RequestStatus],
) -> Result<Vec<RentalRequest>, BookingError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM rental_requests
        WHERE listing_id = $1
          AND status = ANY($2)
          AND start_date <= $3
          AND end_date >= $4
          AND ($5::uuid IS NULL OR id <> $5)
        ORDER BY created_at
        "#,
    ))
    .bind(listing_id)
    .bind(status_array(statuses))
    .bind(interval.end)
    .bind(interval.start)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(request_from_row).collect()
}

/// Locks and returns the listing's live requests overlapping `interval`.
///
/// Rows are locked in id order so concurrent approvals on the same listing
/// queue up instead of deadlocking. Must run inside a transaction.
pub async fn lock_overlapping(
    conn: &mut PgConnection,
    listing_id: &Uuid,
    interval: &DateInterval,
    statuses: &[RequestStatus],
) -> Result<Vec<RentalRequest>, BookingError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM rental_requests
        WHERE listing_id = $1
          AND status = ANY($2)
          AND start_date <= $3
          AND end_date >= $4
        ORDER BY id
        FOR UPDATE
        "#,
    ))
    .bind(listing_id)
    .bind(status_array(statuses))
    .bind(interval.end)
    .bind(interval.start)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(request_from_row).collect()
}

/// Applies a status change plus auxiliary fields and bumps `updated_at`.
///
/// The expected-status predicate is part of the `WHERE` clause, so a row
/// whose status no longer permits the change is left untouched and the
/// call fails with `InvalidTransition`.
pub async fn apply_transition(
    conn: &mut PgConnection,
    id: &Uuid,
    new_status: RequestStatus,
    expected: &[RequestStatus],
    fields: TransitionFields<'_>,
    action: &'static str,
) -> Result<RentalRequest, BookingError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE rental_requests
        SET status = $2,
            rejection_reason = COALESCE($3, rejection_reason),
            cancellation_reason = COALESCE($4, cancellation_reason),
            canceled_by = COALESCE($5, canceled_by),
            updated_at = NOW()
        WHERE id = $1 AND status = ANY($6)
        RETURNING {REQUEST_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(new_status.as_str())
    .bind(fields.rejection_reason)
    .bind(fields.cancellation_reason)
    .bind(fields.canceled_by)
    .bind(status_array(expected))
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => request_from_row(&row),
        None => {
            let current = fetch(conn, id).await?;
            Err(BookingError::InvalidTransition {
                current: current.status,
                action,
            })
        }
    }
}

/// Read-side store for display queries.
///
/// These reads are outside the per-listing serialization discipline and may
/// lag concurrent booking transactions.
pub struct RequestStore {
    pool: PgPool,
}

impl RequestStore {
    /// Creates a new store over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches a single request by id.
    pub async fn get_by_id(&self, id: &Uuid) -> Result<RentalRequest, BookingError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// All requests submitted by the given user, newest first.
    pub async fn list_for_requester(
        &self,
        requester_id: &Uuid,
    ) -> Result<Vec<RentalRequest>, BookingError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM rental_requests
            WHERE requester_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    /// All requests against the given user's listings, newest first.
    pub async fn list_for_owner(
        &self,
        owner_id: &Uuid,
    ) -> Result<Vec<RentalRequest>, BookingError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM rental_requests
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    /// Approved bookings of a listing that overlap the given window, for
    /// availability calendars.
    pub async fn approved_overlapping(
        &self,
        listing_id: &Uuid,
        window: &DateInterval,
    ) -> Result<Vec<RentalRequest>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        fetch_overlapping(
            &mut conn,
            listing_id,
            window,
            None,
            &[RequestStatus::Approved],
        )
        .await
    }
}
