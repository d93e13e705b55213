use sqlx::PgConnection;
use uuid::Uuid;

use crate::booking_types::{BookingError, RentalRequest, RequestStatus};
use crate::interval::DateInterval;
use crate::store;

/// Live requests competing with a candidate for the same dates, split by status.
///
/// Approved members block the candidate from being approved; pending members
/// are auto-rejected when the candidate wins the dates. Rejected and canceled
/// requests never appear here.
#[derive(Debug, Default)]
pub struct ConflictSet {
    /// Overlapping requests already holding the dates
    pub approved: Vec<RentalRequest>,
    /// Overlapping requests still awaiting a decision
    pub pending: Vec<RentalRequest>,
}

impl ConflictSet {
    /// Splits `candidates` into approved/pending conflicts for `interval`,
    /// skipping `exclude` and anything terminal or non-overlapping.
    pub fn partition(
        candidates: &[RentalRequest],
        interval: &DateInterval,
        exclude: &Uuid,
    ) -> Self {
        let mut set = ConflictSet::default();

        for request in candidates {
            if request.id == *exclude || !request.interval.overlaps(interval) {
                continue;
            }
            match request.status {
                RequestStatus::Approved => set.approved.push(request.clone()),
                RequestStatus::Pending => set.pending.push(request.clone()),
                RequestStatus::Rejected | RequestStatus::Canceled => {}
            }
        }

        set
    }

    /// True when nothing competes for the dates.
    pub fn is_empty(&self) -> bool {
        self.approved.is_empty() && self.pending.is_empty()
    }
}

/// Locks the live requests competing with `target` and resolves its conflicts.
///
/// Returns the target as re-read under the lock (its status may have changed
/// since the caller's first read) together with the conflict partition. Must
/// run inside the transaction that will write the transition.
pub async fn resolve_for_approval(
    conn: &mut PgConnection,
    target: &RentalRequest,
) -> Result<(RentalRequest, ConflictSet), BookingError> {
    let live = store::lock_overlapping(
        conn,
        &target.listing_id,
        &target.interval,
        &[RequestStatus::Pending, RequestStatus::Approved],
    )
    .await?;

    // The lock query re-evaluates row status, so a target that was decided
    // by a concurrent transaction drops out of the locked set.
    let current = match live.iter().find(|r| r.id == target.id) {
        Some(request) => request.clone(),
        None => store::fetch(conn, &target.id).await?,
    };

    let conflicts = ConflictSet::partition(&live, &target.interval, &target.id);

    Ok((current, conflicts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn request(status: RequestStatus, start: u32, end: u32) -> RentalRequest {
        RentalRequest {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            interval: DateInterval::new(date(start), date(end)).unwrap(),
            status,
            total_price: 120.0,
            rejection_reason: None,
            cancellation_reason: None,
            canceled_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn partitions_by_status() {
        let candidate = request(RequestStatus::Pending, 1, 3);
        let approved = request(RequestStatus::Approved, 2, 4);
        let pending = request(RequestStatus::Pending, 3, 5);

        let set = ConflictSet::partition(
            &[candidate.clone(), approved.clone(), pending.clone()],
            &candidate.interval,
            &candidate.id,
        );

        assert_eq!(set.approved.len(), 1);
        assert_eq!(set.approved[0].id, approved.id);
        assert_eq!(set.pending.len(), 1);
        assert_eq!(set.pending[0].id, pending.id);
    }

    #[test]
    fn skips_the_candidate_itself() {
        let candidate = request(RequestStatus::Pending, 1, 3);

        let set = ConflictSet::partition(
            std::slice::from_ref(&candidate),
            &candidate.interval,
            &candidate.id,
        );

        assert!(set.is_empty());
    }

    #[test]
    fn skips_non_overlapping_requests() {
        let candidate = request(RequestStatus::Pending, 1, 3);
        let later = request(RequestStatus::Approved, 4, 6);

        let set = ConflictSet::partition(&[later], &candidate.interval, &candidate.id);

        assert!(set.is_empty());
    }

    #[test]
    fn terminal_requests_never_conflict() {
        let candidate = request(RequestStatus::Pending, 1, 3);
        let rejected = request(RequestStatus::Rejected, 1, 3);
        let canceled = request(RequestStatus::Canceled, 2, 4);

        let set = ConflictSet::partition(&[rejected, canceled], &candidate.interval, &candidate.id);

        assert!(set.is_empty());
    }
}
