//! # Notification Services
//!
//! This crate provides the AWS-backed senders behind the booking engine's
//! notification traits: SES for email, SNS for SMS, plus mock senders for
//! local development.

/// AWS SES/SNS sender implementations and mocks.
pub mod service;

pub use service::{AwsSesEmailService, AwsSnsSmsService, MockEmailService, MockSmsService};
