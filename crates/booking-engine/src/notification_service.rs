use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::booking_types::{BookingEvent, NotifierConfig, RentalRequest};

/// Errors produced while dispatching notifications. These never propagate
/// into the booking operation that triggered the dispatch.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Email delivery error
    #[error("Email error: {0}")]
    Email(String),
    /// SMS delivery error
    #[error("SMS error: {0}")]
    Sms(String),
}

/// Outcome channel for booking transitions, consumed by the engine.
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Informs `recipient_id` that `request` went through `event`.
    async fn send_booking_notification(
        &self,
        recipient_id: &Uuid,
        request: &RentalRequest,
        event: &BookingEvent,
    ) -> Result<(), NotificationError>;
}

/// Trait for email sender implementations.
#[async_trait::async_trait]
pub trait EmailService: Send + Sync {
    /// Sends an email, returning the provider's message id.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError>;
}

/// Trait for SMS sender implementations.
#[async_trait::async_trait]
pub trait SmsService: Send + Sync {
    /// Sends an SMS, returning the provider's message id.
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError>;
}

/// Per-user notification channel opt-ins.
#[derive(Debug, Deserialize)]
pub struct NotificationPreferences {
    /// Email notifications enabled
    pub email: bool,
    /// SMS notifications enabled
    pub sms: bool,
}

/// Notification dispatcher backed by the marketplace database.
///
/// Resolves the recipient's contact details and preferences, renders the
/// event into email/SMS content, delivers through the configured senders
/// with retry, and records every attempt. Delivery failures are logged and
/// recorded, never surfaced to the booking operation.
pub struct NotificationServiceImpl {
    pool: PgPool,
    email_service: Option<Arc<dyn EmailService>>,
    sms_service: Option<Arc<dyn SmsService>>,
    config: NotifierConfig,
}

#[async_trait::async_trait]
impl NotificationService for NotificationServiceImpl {
    async fn send_booking_notification(
        &self,
        recipient_id: &Uuid,
        request: &RentalRequest,
        event: &BookingEvent,
    ) -> Result<(), NotificationError> {
        info!(
            request_id = %request.id,
            recipient_id = %recipient_id,
            "dispatching booking notification"
        );

        let recipient = self.get_recipient_details(recipient_id).await?;
        let listing_title = self.get_listing_title(&request.listing_id).await?;

        if recipient.preferences.email && recipient.email_verified {
            if let Some(ref email_service) = self.email_service {
                let (subject, body) = email_content(request, &listing_title, event);

                match attempt_email(
                    email_service.as_ref(),
                    &self.config,
                    &recipient.email,
                    &subject,
                    &body,
                )
                .await
                {
                    Ok(external_id) => {
                        self.record_notification(
                            recipient_id,
                            request,
                            event,
                            "email",
                            &recipient.email,
                            Some(&subject),
                            &body,
                            "sent",
                            Some(&external_id),
                        )
                        .await?;
                    }
                    Err(e) => {
                        error!(
                            request_id = %request.id,
                            "email delivery failed for {}: {}",
                            recipient.email,
                            e
                        );
                        self.record_notification(
                            recipient_id,
                            request,
                            event,
                            "email",
                            &recipient.email,
                            Some(&subject),
                            &body,
                            "failed",
                            None,
                        )
                        .await?;
                    }
                }
            }
        }

        if recipient.preferences.sms && recipient.phone_verified {
            if let (Some(phone), Some(sms_service)) = (&recipient.phone, &self.sms_service) {
                let message = sms_content(request, &listing_title, event);

                match attempt_sms(sms_service.as_ref(), &self.config, phone, &message).await {
                    Ok(external_id) => {
                        self.record_notification(
                            recipient_id,
                            request,
                            event,
                            "sms",
                            phone,
                            None,
                            &message,
                            "sent",
                            Some(&external_id),
                        )
                        .await?;
                    }
                    Err(e) => {
                        error!(
                            request_id = %request.id,
                            "sms delivery failed for {}: {}",
                            phone,
                            e
                        );
                        self.record_notification(
                            recipient_id,
                            request,
                            event,
                            "sms",
                            phone,
                            None,
                            &message,
                            "failed",
                            None,
                        )
                        .await?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl NotificationServiceImpl {
    /// Creates a dispatcher with the given senders; a `None` sender disables
    /// that channel.
    pub fn new(
        pool: PgPool,
        email_service: Option<Arc<dyn EmailService>>,
        sms_service: Option<Arc<dyn SmsService>>,
        config: Option<NotifierConfig>,
    ) -> Self {
        Self {
            pool,
            email_service,
            sms_service,
            config: config.unwrap_or_default(),
        }
    }

    /// Looks up the recipient's contact details and channel preferences.
    async fn get_recipient_details(
        &self,
        user_id: &Uuid,
    ) -> Result<RecipientDetails, NotificationError> {
        let row = sqlx::query(
            r#"
            SELECT email, name, phone, email_verified, phone_verified, notification_preferences
            FROM users
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let preferences = row
                    .get::<Option<serde_json::Value>, _>("notification_preferences")
                    .and_then(|prefs| serde_json::from_value(prefs).ok())
                    .unwrap_or(NotificationPreferences {
                        email: true,
                        sms: true,
                    });

                Ok(RecipientDetails {
                    email: row.get("email"),
                    phone: row.get("phone"),
                    email_verified: row.get::<Option<bool>, _>("email_verified").unwrap_or(false),
                    phone_verified: row.get::<Option<bool>, _>("phone_verified").unwrap_or(false),
                    preferences,
                })
            }
            None => Err(NotificationError::Database(sqlx::Error::RowNotFound)),
        }
    }

    /// Resolves the listing title for notification context.
    async fn get_listing_title(&self, listing_id: &Uuid) -> Result<String, NotificationError> {
        let row = sqlx::query("SELECT title FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.get("title")),
            None => Ok("your listing".to_string()),
        }
    }

    /// Records a delivery attempt in the notifications table.
    #[allow(clippy::too_many_arguments)]
    async fn record_notification(
        &self,
        user_id: &Uuid,
        request: &RentalRequest,
        event: &BookingEvent,
        channel: &str,
        recipient: &str,
        subject: Option<&str>,
        message: &str,
        status: &str,
        external_id: Option<&str>,
    ) -> Result<(), NotificationError> {
        let event_details = serde_json::to_value(event)
            .map_err(|e| NotificationError::Database(sqlx::Error::Protocol(e.to_string())))?;

        let sent_at = if status == "sent" {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query(
            r#"
            INSERT INTO notifications
            (user_id, rental_request_id, type, recipient, subject, message, event_details, status, sent_at, external_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user_id)
        .bind(request.id)
        .bind(channel)
        .bind(recipient)
        .bind(subject)
        .bind(message)
        .bind(event_details)
        .bind(status)
        .bind(sent_at)
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Delivers an email, retrying with backoff up to the configured attempts.
async fn attempt_email(
    service: &dyn EmailService,
    config: &NotifierConfig,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<String, NotificationError> {
    let mut attempt = 1;
    loop {
        match service.send_email(to, subject, body).await {
            Ok(id) => return Ok(id),
            Err(e) if attempt < config.max_attempts => {
                warn!("email attempt {} failed, retrying: {}", attempt, e);
                backoff_sleep(config, attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delivers an SMS, retrying with backoff up to the configured attempts.
async fn attempt_sms(
    service: &dyn SmsService,
    config: &NotifierConfig,
    to: &str,
    message: &str,
) -> Result<String, NotificationError> {
    let mut attempt = 1;
    loop {
        match service.send_sms(to, message).await {
            Ok(id) => return Ok(id),
            Err(e) if attempt < config.max_attempts => {
                warn!("sms attempt {} failed, retrying: {}", attempt, e);
                backoff_sleep(config, attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sleeps the linear backoff for the given attempt, with jitter so retries
/// from concurrent dispatches spread out.
async fn backoff_sleep(config: &NotifierConfig, attempt: u32) {
    let jitter_ms = {
        let mut rng = rand::rng();
        rng.random_range(0..250)
    };
    let delay = config.retry_backoff * attempt + std::time::Duration::from_millis(jitter_ms);
    tokio::time::sleep(delay).await;
}

/// Renders the email subject and body for an event.
fn email_content(
    request: &RentalRequest,
    listing_title: &str,
    event: &BookingEvent,
) -> (String, String) {
    let dates = format!(
        "{} to {} ({} days)",
        request.interval.start.format("%B %d, %Y"),
        request.interval.end.format("%B %d, %Y"),
        request.interval.days()
    );

    match event {
        BookingEvent::RequestCreated => (
            format!(
                "New rental request: {} ({} - {})",
                listing_title,
                request.interval.start.format("%m/%d"),
                request.interval.end.format("%m/%d")
            ),
            format!(
                "You received a new rental request for {}.\n\n\
                 Dates: {}\nTotal: ${:.2}\n\n\
                 Approve or decline the request from your dashboard. The dates stay \
                 available to other renters until you approve a request.",
                listing_title, dates, request.total_price
            ),
        ),
        BookingEvent::RequestApproved => (
            format!("Your rental of {} is confirmed", listing_title),
            format!(
                "Good news! The owner approved your rental request for {}.\n\n\
                 Dates: {}\nTotal: ${:.2}\n\n\
                 You can review the booking details in the app.",
                listing_title, dates, request.total_price
            ),
        ),
        BookingEvent::RequestRejected { reason } => {
            let reason_line = match reason {
                Some(reason) => format!("Reason: {}\n\n", reason),
                None => String::new(),
            };
            (
                format!("Your rental request for {} was declined", listing_title),
                format!(
                    "Your rental request for {} ({}) was declined.\n\n{}\
                     Other dates may still be available.",
                    listing_title, dates, reason_line
                ),
            )
        }
        BookingEvent::RequestCanceled { reason, .. } => {
            let reason_line = match reason {
                Some(reason) => format!("Reason: {}\n\n", reason),
                None => String::new(),
            };
            (
                format!("Booking canceled: {}", listing_title),
                format!(
                    "The booking of {} for {} was canceled.\n\n{}\
                     The dates are available again.",
                    listing_title, dates, reason_line
                ),
            )
        }
    }
}

/// Renders the short SMS line for an event.
fn sms_content(request: &RentalRequest, listing_title: &str, event: &BookingEvent) -> String {
    let dates = format!(
        "{}-{}",
        request.interval.start.format("%m/%d"),
        request.interval.end.format("%m/%d")
    );

    match event {
        BookingEvent::RequestCreated => format!(
            "New rental request for {} ({}). Open the app to respond.",
            listing_title, dates
        ),
        BookingEvent::RequestApproved => {
            format!("Your rental of {} ({}) is confirmed!", listing_title, dates)
        }
        BookingEvent::RequestRejected { .. } => format!(
            "Your rental request for {} ({}) was declined.",
            listing_title, dates
        ),
        BookingEvent::RequestCanceled { .. } => {
            format!("Booking of {} ({}) was canceled.", listing_title, dates)
        }
    }
}

/// Contact details and preferences of a notification recipient.
#[derive(Debug)]
struct RecipientDetails {
    pub email: String,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub preferences: NotificationPreferences,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking_types::RequestStatus;
    use crate::interval::DateInterval;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockEmailService;

    #[async_trait::async_trait]
    impl EmailService for MockEmailService {
        async fn send_email(
            &self,
            _to: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<String, NotificationError> {
            Ok("mock-email-id".to_string())
        }
    }

    struct FlakyEmailService {
        calls: AtomicU32,
        failures_before_success: u32,
    }

    #[async_trait::async_trait]
    impl EmailService for FlakyEmailService {
        async fn send_email(
            &self,
            _to: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<String, NotificationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(NotificationError::Email("transient".to_string()))
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    fn fast_config(max_attempts: u32) -> NotifierConfig {
        NotifierConfig {
            max_attempts,
            retry_backoff: std::time::Duration::from_millis(1),
        }
    }

    fn sample_request(event_dates: (u32, u32)) -> RentalRequest {
        let (start, end) = event_dates;
        RentalRequest {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            interval: DateInterval::new(
                NaiveDate::from_ymd_opt(2025, 7, start).unwrap(),
                NaiveDate::from_ymd_opt(2025, 7, end).unwrap(),
            )
            .unwrap(),
            status: RequestStatus::Pending,
            total_price: 150.0,
            rejection_reason: None,
            cancellation_reason: None,
            canceled_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn email_delivery_succeeds_first_try() {
        let id = attempt_email(&MockEmailService, &fast_config(3), "a@b.c", "s", "b")
            .await
            .unwrap();
        assert_eq!(id, "mock-email-id");
    }

    #[tokio::test]
    async fn email_delivery_retries_transient_failures() {
        let service = FlakyEmailService {
            calls: AtomicU32::new(0),
            failures_before_success: 2,
        };

        let id = attempt_email(&service, &fast_config(3), "a@b.c", "s", "b")
            .await
            .unwrap();

        assert_eq!(id, "recovered");
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn email_delivery_gives_up_after_max_attempts() {
        let service = FlakyEmailService {
            calls: AtomicU32::new(0),
            failures_before_success: 10,
        };

        let result = attempt_email(&service, &fast_config(3), "a@b.c", "s", "b").await;

        assert!(result.is_err());
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn approval_email_mentions_listing_and_dates() {
        let request = sample_request((1, 3));
        let (subject, body) =
            email_content(&request, "Canoe with trailer", &BookingEvent::RequestApproved);

        assert!(subject.contains("Canoe with trailer"));
        assert!(body.contains("July 01, 2025"));
        assert!(body.contains("July 03, 2025"));
        assert!(body.contains("$150.00"));
    }

    #[test]
    fn rejection_email_includes_the_reason_when_given() {
        let request = sample_request((1, 3));
        let event = BookingEvent::RequestRejected {
            reason: Some(crate::transitions::CONFLICT_REJECTION_REASON.to_string()),
        };

        let (_, body) = email_content(&request, "Canoe with trailer", &event);
        assert!(body.contains("Another request for these dates was approved"));
    }

    #[test]
    fn rejection_email_reads_cleanly_without_a_reason() {
        let request = sample_request((1, 3));
        let event = BookingEvent::RequestRejected { reason: None };

        let (_, body) = email_content(&request, "Canoe with trailer", &event);
        assert!(!body.contains("Reason:"));
    }

    #[test]
    fn sms_lines_stay_short() {
        let request = sample_request((1, 3));
        for event in [
            BookingEvent::RequestCreated,
            BookingEvent::RequestApproved,
            BookingEvent::RequestRejected { reason: None },
            BookingEvent::RequestCanceled {
                canceled_by: Uuid::new_v4(),
                reason: None,
            },
        ] {
            let line = sms_content(&request, "Canoe with trailer", &event);
            assert!(line.len() < 160, "sms too long: {}", line);
        }
    }
}
