use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tokio::time::timeout;
use tracing::{error, info};
use uuid::Uuid;

use listings::ListingDirectory;

use crate::booking_types::{
    BookingEngineConfig, BookingError, BookingEvent, RentalRequest, RequestStatus,
};
use crate::conflicts;
use crate::notification_service::NotificationService;
use crate::store::{self, NewRequest, TransitionFields};
use crate::transitions::{self, CONFLICT_REJECTION_REASON};

/// The booking authority for rental requests.
///
/// Every state change goes through one of the four operations here. The
/// conflict-check-and-transition sequence of each operation runs in a single
/// database transaction so overlapping approvals on a listing serialize;
/// notifications are dispatched only after the transaction commits.
#[derive(Clone)]
pub struct BookingEngine {
    pool: PgPool,
    listings: Arc<dyn ListingDirectory>,
    notifier: Arc<dyn NotificationService>,
    config: BookingEngineConfig,
}

impl BookingEngine {
    /// Creates a new engine over the marketplace database.
    pub fn new(
        pool: PgPool,
        listings: Arc<dyn ListingDirectory>,
        notifier: Arc<dyn NotificationService>,
        config: Option<BookingEngineConfig>,
    ) -> Self {
        Self {
            pool,
            listings,
            notifier,
            config: config.unwrap_or_default(),
        }
    }

    /// Submits a new rental request for a listing.
    ///
    /// The request starts `pending`; competing pending requests for the same
    /// dates are allowed to coexist until the owner decides one of them.
    pub async fn create_request(
        &self,
        listing_id: Uuid,
        requester_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        total_price: f64,
    ) -> Result<RentalRequest, BookingError> {
        let owner_id = self.listings.owner_of(&listing_id).await?;
        let interval = transitions::decide_create(start, end, &requester_id, &owner_id)?;

        let new_request = NewRequest {
            listing_id,
            requester_id,
            owner_id,
            interval,
            total_price,
        };

        let request = self
            .bounded(async {
                let mut conn = self.pool.acquire().await?;
                store::insert(&mut conn, &new_request).await
            })
            .await?;

        info!(
            request_id = %request.id,
            listing_id = %request.listing_id,
            "rental request created"
        );

        self.spawn_notification(owner_id, request.clone(), BookingEvent::RequestCreated);

        Ok(request)
    }

    /// Approves a pending request as the listing owner.
    ///
    /// Fails with `DateConflict` when an approved booking already overlaps.
    /// Every overlapping pending sibling is rejected in the same transaction,
    /// so the approval and its cascade are atomic: both or neither.
    pub async fn approve_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
    ) -> Result<RentalRequest, BookingError> {
        let (approved, cascade) = self
            .bounded(async {
                let mut tx = self.pool.begin().await?;

                let target = store::fetch(&mut tx, &request_id).await?;
                let (current, conflicts) =
                    conflicts::resolve_for_approval(&mut tx, &target).await?;
                let plan = transitions::decide_approve(&current, &actor_id, &conflicts)?;

                let approved = store::apply_transition(
                    &mut tx,
                    &request_id,
                    RequestStatus::Approved,
                    &[RequestStatus::Pending],
                    TransitionFields::default(),
                    "approved",
                )
                .await?;

                let mut cascade = Vec::with_capacity(plan.auto_reject.len());
                for conflict_id in &plan.auto_reject {
                    let rejected = store::apply_transition(
                        &mut tx,
                        conflict_id,
                        RequestStatus::Rejected,
                        &[RequestStatus::Pending],
                        TransitionFields {
                            rejection_reason: Some(CONFLICT_REJECTION_REASON),
                            ..TransitionFields::default()
                        },
                        "rejected",
                    )
                    .await?;
                    cascade.push(rejected);
                }

                tx.commit().await?;
                Ok((approved, cascade))
            })
            .await?;

        info!(
            request_id = %approved.id,
            listing_id = %approved.listing_id,
            auto_rejected = cascade.len(),
            "rental request approved"
        );

        self.spawn_notification(
            approved.requester_id,
            approved.clone(),
            BookingEvent::RequestApproved,
        );
        for rejected in &cascade {
            self.spawn_notification(
                rejected.requester_id,
                rejected.clone(),
                BookingEvent::RequestRejected {
                    reason: Some(CONFLICT_REJECTION_REASON.to_string()),
                },
            );
        }

        Ok(approved)
    }

    /// Rejects a pending request as the listing owner.
    pub async fn reject_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<RentalRequest, BookingError> {
        let rejected = self
            .bounded(async {
                let mut tx = self.pool.begin().await?;

                let target = store::lock(&mut tx, &request_id).await?;
                transitions::decide_reject(&target, &actor_id)?;

                let rejected = store::apply_transition(
                    &mut tx,
                    &request_id,
                    RequestStatus::Rejected,
                    &[RequestStatus::Pending],
                    TransitionFields {
                        rejection_reason: reason.as_deref(),
                        ..TransitionFields::default()
                    },
                    "rejected",
                )
                .await?;

                tx.commit().await?;
                Ok(rejected)
            })
            .await?;

        info!(request_id = %rejected.id, "rental request rejected");

        self.spawn_notification(
            rejected.requester_id,
            rejected.clone(),
            BookingEvent::RequestRejected {
                reason: rejected.rejection_reason.clone(),
            },
        );

        Ok(rejected)
    }

    /// Cancels a pending or approved request as either party.
    ///
    /// An approved booking can only be canceled while its start day has not
    /// passed.
    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<RentalRequest, BookingError> {
        let today = Utc::now().date_naive();

        let canceled = self
            .bounded(async {
                let mut tx = self.pool.begin().await?;

                let target = store::lock(&mut tx, &request_id).await?;
                transitions::decide_cancel(&target, &actor_id, today)?;

                let canceled = store::apply_transition(
                    &mut tx,
                    &request_id,
                    RequestStatus::Canceled,
                    &[RequestStatus::Pending, RequestStatus::Approved],
                    TransitionFields {
                        cancellation_reason: reason.as_deref(),
                        canceled_by: Some(actor_id),
                        ..TransitionFields::default()
                    },
                    "canceled",
                )
                .await?;

                tx.commit().await?;
                Ok(canceled)
            })
            .await?;

        info!(
            request_id = %canceled.id,
            canceled_by = %actor_id,
            "rental request canceled"
        );

        let counterparty = if actor_id == canceled.owner_id {
            canceled.requester_id
        } else {
            canceled.owner_id
        };
        self.spawn_notification(
            counterparty,
            canceled.clone(),
            BookingEvent::RequestCanceled {
                canceled_by: actor_id,
                reason: canceled.cancellation_reason.clone(),
            },
        );

        Ok(canceled)
    }

    /// Bounds a store interaction by the configured transaction timeout.
    ///
    /// On elapse the transaction is dropped unfinished and the store's abort
    /// guarantees no partial effect.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, BookingError>>,
    ) -> Result<T, BookingError> {
        timeout(self.config.transaction_timeout, operation)
            .await
            .map_err(|_| BookingError::Timeout)?
    }

    /// Fire-and-forget delivery after a committed transition. Failures are
    /// logged and never reach the booking caller.
    fn spawn_notification(&self, recipient_id: Uuid, request: RentalRequest, event: BookingEvent) {
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_booking_notification(&recipient_id, &request, &event)
                .await
            {
                error!(
                    request_id = %request.id,
                    recipient_id = %recipient_id,
                    "failed to deliver booking notification: {}",
                    e
                );
            }
        });
    }
}
