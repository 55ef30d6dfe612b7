//! Newsletter signup over the hosted welcome-email function.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Request(String),
    #[error("mail response could not be decoded: {0}")]
    Decode(String),
    #[error("send function rejected the message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome(&self, email: &str, first_name: &str) -> Result<SendReceipt, MailError>;
}

/// Outcome surfaced to the signup form. A failed send is not an error to
/// the caller (the subscription intent is recorded upstream either way),
/// so it comes back as `accepted: false` rather than propagating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub accepted: bool,
    pub message_id: Option<String>,
}

pub struct NewsletterService {
    mailer: Arc<dyn Mailer>,
}

impl NewsletterService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub async fn subscribe(
        &self,
        email: &str,
        first_name: &str,
    ) -> Result<SubscribeOutcome, AppError> {
        let email = email.trim();
        validate_email(email)?;
        let first_name = first_name.trim();

        match self.mailer.send_welcome(email, first_name).await {
            Ok(receipt) => {
                info!(message_id = ?receipt.message_id, "welcome email sent");
                Ok(SubscribeOutcome {
                    accepted: true,
                    message_id: receipt.message_id,
                })
            }
            Err(err) => {
                warn!(error = %err, "welcome email failed");
                Ok(SubscribeOutcome {
                    accepted: false,
                    message_id: None,
                })
            }
        }
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "`{email}` is not a usable email address"
        )))
    }
}
