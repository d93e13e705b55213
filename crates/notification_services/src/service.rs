use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ses::Client as SesClient;
use aws_sdk_sns::Client as SnsClient;
use uuid::Uuid;

use booking_engine::{EmailService, NotificationError, SmsService};

/// Email sender backed by AWS SES.
#[derive(Debug, Clone)]
pub struct AwsSesEmailService {
    client: SesClient,
    from_email: String,
}

impl AwsSesEmailService {
    /// Creates a sender with AWS clients initialized from the environment.
    pub async fn new() -> Result<Self, NotificationError> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let client = SesClient::new(&config);

        let from_email = std::env::var("FROM_EMAIL")
            .map_err(|_| NotificationError::Email("FROM_EMAIL not set".to_string()))?;

        Ok(Self { client, from_email })
    }
}

#[async_trait]
impl EmailService for AwsSesEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError> {
        let subject_content = aws_sdk_ses::types::Content::builder()
            .data(subject)
            .build()
            .map_err(|e| NotificationError::Email(format!("Failed to build subject: {}", e)))?;

        let text_content = aws_sdk_ses::types::Content::builder()
            .data(body)
            .build()
            .map_err(|e| NotificationError::Email(format!("Failed to build text body: {}", e)))?;

        let message = aws_sdk_ses::types::Message::builder()
            .subject(subject_content)
            .body(aws_sdk_ses::types::Body::builder().text(text_content).build())
            .build();

        let destination = aws_sdk_ses::types::Destination::builder()
            .to_addresses(to)
            .build();

        let output = self
            .client
            .send_email()
            .source(&self.from_email)
            .destination(destination)
            .message(message)
            .send()
            .await
            .map_err(|e| {
                let error_msg = if let Some(service_error) = e.as_service_error() {
                    format!("AWS SES service error: {:?}", service_error)
                } else {
                    format!("AWS SES error: {}", e)
                };
                NotificationError::Email(error_msg)
            })?;

        log::info!("Email sent to {} via SES", to);
        Ok(output.message_id().to_string())
    }
}

/// SMS sender backed by AWS SNS.
#[derive(Debug, Clone)]
pub struct AwsSnsSmsService {
    client: SnsClient,
}

impl AwsSnsSmsService {
    /// Creates a sender with AWS clients initialized from the environment.
    pub async fn new() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: SnsClient::new(&config),
        }
    }
}

#[async_trait]
impl SmsService for AwsSnsSmsService {
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError> {
        // SNS requires E.164
        let formatted_phone = if to.starts_with('+') {
            to.to_string()
        } else {
            format!("+{}", to.replace(['(', ')', '-', ' ', '.'], ""))
        };

        let output = self
            .client
            .publish()
            .phone_number(&formatted_phone)
            .message(message)
            .send()
            .await
            .map_err(|e| NotificationError::Sms(e.to_string()))?;

        log::info!("SMS sent to {} via SNS", formatted_phone);
        Ok(output.message_id().unwrap_or_default().to_string())
    }
}

/// Mock email sender for development and tests: logs and returns a fake id.
pub struct MockEmailService;

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError> {
        log::info!("[MOCK EMAIL] To: {}", to);
        log::info!("[MOCK EMAIL] Subject: {}", subject);
        log::info!("[MOCK EMAIL] Body:\n{}", body);

        Ok(format!("mock-email-{}", Uuid::new_v4()))
    }
}

/// Mock SMS sender for development and tests: logs and returns a fake id.
pub struct MockSmsService;

#[async_trait]
impl SmsService for MockSmsService {
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError> {
        log::info!("[MOCK SMS] To: {}", to);
        log::info!("[MOCK SMS] Message: {}", message);

        Ok(format!("mock-sms-{}", Uuid::new_v4()))
    }
}
