use chrono::NaiveDate;
use uuid::Uuid;

use crate::booking_types::{BookingError, RentalRequest, RequestStatus};
use crate::conflicts::ConflictSet;
use crate::interval::DateInterval;

/// Reason recorded on requests auto-rejected by a competing approval.
pub const CONFLICT_REJECTION_REASON: &str = "Another request for these dates was approved";

/// Guards the creation of a new request and builds its interval.
///
/// Multiple pending requests may coexist for the same dates, so creation
/// performs no conflict check; race arbitration happens at approval time.
pub fn decide_create(
    start: NaiveDate,
    end: NaiveDate,
    requester_id: &Uuid,
    owner_id: &Uuid,
) -> Result<DateInterval, BookingError> {
    let interval = DateInterval::new(start, end).ok_or(BookingError::InvalidInterval)?;

    if requester_id == owner_id {
        return Err(BookingError::SelfBookingNotAllowed);
    }

    Ok(interval)
}

/// The writes an approval commits: the approval itself plus the cascading
/// rejection of every overlapping pending sibling.
#[derive(Debug)]
pub struct ApprovalPlan {
    /// Pending conflicts to reject in the same transaction
    pub auto_reject: Vec<Uuid>,
}

/// Guards `pending -> approved`. Only the listing owner may approve, and an
/// existing approved overlap blocks the dates outright.
pub fn decide_approve(
    target: &RentalRequest,
    actor_id: &Uuid,
    conflicts: &ConflictSet,
) -> Result<ApprovalPlan, BookingError> {
    if *actor_id != target.owner_id {
        return Err(BookingError::Forbidden);
    }

    if target.status != RequestStatus::Pending {
        return Err(BookingError::InvalidTransition {
            current: target.status,
            action: "approved",
        });
    }

    if !conflicts.approved.is_empty() {
        return Err(BookingError::DateConflict);
    }

    Ok(ApprovalPlan {
        auto_reject: conflicts.pending.iter().map(|r| r.id).collect(),
    })
}

/// Guards `pending -> rejected`. Only the listing owner may reject.
pub fn decide_reject(target: &RentalRequest, actor_id: &Uuid) -> Result<(), BookingError> {
    if *actor_id != target.owner_id {
        return Err(BookingError::Forbidden);
    }

    if target.status != RequestStatus::Pending {
        return Err(BookingError::InvalidTransition {
            current: target.status,
            action: "rejected",
        });
    }

    Ok(())
}

/// Guards `pending|approved -> canceled` for either party.
///
/// An approved booking can only be canceled while its start day has not
/// passed; a pending request carries no such commitment and may be canceled
/// at any time.
pub fn decide_cancel(
    target: &RentalRequest,
    actor_id: &Uuid,
    today: NaiveDate,
) -> Result<(), BookingError> {
    if *actor_id != target.owner_id && *actor_id != target.requester_id {
        return Err(BookingError::Forbidden);
    }

    match target.status {
        RequestStatus::Pending => Ok(()),
        RequestStatus::Approved => {
            if today <= target.interval.start {
                Ok(())
            } else {
                Err(BookingError::RentalAlreadyStarted)
            }
        }
        current => Err(BookingError::InvalidTransition {
            current,
            action: "canceled",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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
            total_price: 80.0,
            rejection_reason: None,
            cancellation_reason: None,
            canceled_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pending_conflict(start: u32, end: u32) -> RentalRequest {
        request(RequestStatus::Pending, start, end)
    }

    mod create {
        use super::*;

        #[test]
        fn accepts_a_valid_interval() {
            let interval =
                decide_create(date(1), date(3), &Uuid::new_v4(), &Uuid::new_v4()).unwrap();
            assert_eq!(interval.start, date(1));
            assert_eq!(interval.end, date(3));
        }

        #[test]
        fn rejects_inverted_dates() {
            let err =
                decide_create(date(3), date(1), &Uuid::new_v4(), &Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, BookingError::InvalidInterval));
        }

        #[test]
        fn rejects_self_booking() {
            let owner = Uuid::new_v4();
            let err = decide_create(date(1), date(3), &owner, &owner).unwrap_err();
            assert!(matches!(err, BookingError::SelfBookingNotAllowed));
        }
    }

    mod approve {
        use super::*;

        #[test]
        fn owner_approves_a_pending_request_without_conflicts() {
            let target = request(RequestStatus::Pending, 1, 3);
            let plan =
                decide_approve(&target, &target.owner_id, &ConflictSet::default()).unwrap();
            assert!(plan.auto_reject.is_empty());
        }

        #[test]
        fn plan_rejects_every_overlapping_pending_sibling() {
            let target = request(RequestStatus::Pending, 1, 3);
            let sibling_a = pending_conflict(2, 4);
            let sibling_b = pending_conflict(3, 5);
            let conflicts = ConflictSet {
                approved: vec![],
                pending: vec![sibling_a.clone(), sibling_b.clone()],
            };

            let plan = decide_approve(&target, &target.owner_id, &conflicts).unwrap();

            assert_eq!(plan.auto_reject, vec![sibling_a.id, sibling_b.id]);
        }

        #[test]
        fn approved_overlap_blocks_the_dates() {
            let target = request(RequestStatus::Pending, 3, 5);
            let conflicts = ConflictSet {
                approved: vec![request(RequestStatus::Approved, 1, 3)],
                pending: vec![],
            };

            let err = decide_approve(&target, &target.owner_id, &conflicts).unwrap_err();
            assert!(matches!(err, BookingError::DateConflict));
        }

        #[test]
        fn only_the_owner_may_approve() {
            let target = request(RequestStatus::Pending, 1, 3);
            let err =
                decide_approve(&target, &target.requester_id, &ConflictSet::default())
                    .unwrap_err();
            assert!(matches!(err, BookingError::Forbidden));
        }

        #[test]
        fn terminal_requests_cannot_be_approved() {
            for status in [
                RequestStatus::Approved,
                RequestStatus::Rejected,
                RequestStatus::Canceled,
            ] {
                let target = request(status, 1, 3);
                let err = decide_approve(&target, &target.owner_id, &ConflictSet::default())
                    .unwrap_err();
                assert!(matches!(
                    err,
                    BookingError::InvalidTransition { current, .. } if current == status
                ));
            }
        }
    }

    mod reject {
        use super::*;

        #[test]
        fn owner_rejects_a_pending_request() {
            let target = request(RequestStatus::Pending, 1, 3);
            assert!(decide_reject(&target, &target.owner_id).is_ok());
        }

        #[test]
        fn requester_cannot_reject() {
            let target = request(RequestStatus::Pending, 1, 3);
            let err = decide_reject(&target, &target.requester_id).unwrap_err();
            assert!(matches!(err, BookingError::Forbidden));
        }

        #[test]
        fn repeated_rejection_is_an_invalid_transition() {
            let target = request(RequestStatus::Rejected, 1, 3);
            let err = decide_reject(&target, &target.owner_id).unwrap_err();
            assert!(matches!(err, BookingError::InvalidTransition { .. }));
        }
    }

    mod cancel {
        use super::*;

        #[test]
        fn either_party_cancels_a_pending_request() {
            let target = request(RequestStatus::Pending, 1, 3);
            assert!(decide_cancel(&target, &target.requester_id, date(10)).is_ok());
            assert!(decide_cancel(&target, &target.owner_id, date(10)).is_ok());
        }

        #[test]
        fn third_parties_are_forbidden() {
            let target = request(RequestStatus::Approved, 1, 3);
            let err = decide_cancel(&target, &Uuid::new_v4(), date(1)).unwrap_err();
            assert!(matches!(err, BookingError::Forbidden));
        }

        #[test]
        fn approved_booking_cancels_up_to_its_start_day() {
            let target = request(RequestStatus::Approved, 10, 12);
            assert!(decide_cancel(&target, &target.requester_id, date(9)).is_ok());
            assert!(decide_cancel(&target, &target.requester_id, date(10)).is_ok());
        }

        #[test]
        fn started_rental_cannot_be_canceled() {
            let target = request(RequestStatus::Approved, 10, 12);
            let err = decide_cancel(&target, &target.requester_id, date(11)).unwrap_err();
            assert!(matches!(err, BookingError::RentalAlreadyStarted));
        }

        #[test]
        fn stale_pending_request_still_cancels_after_its_start() {
            // No timing guard for pending: nothing was committed yet.
            let target = request(RequestStatus::Pending, 1, 3);
            assert!(decide_cancel(&target, &target.requester_id, date(20)).is_ok());
        }

        #[test]
        fn terminal_requests_cannot_be_canceled_again() {
            let target = request(RequestStatus::Canceled, 1, 3);
            let err = decide_cancel(&target, &target.owner_id, date(1)).unwrap_err();
            assert!(matches!(err, BookingError::InvalidTransition { .. }));
        }
    }
}
