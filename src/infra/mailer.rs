//! Welcome-email boundary: a plain HTTP POST to the hosted send function.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::newsletter::{MailError, Mailer, SendReceipt};
use crate::infra::error::InfraError;

pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    email: &'a str,
    #[serde(rename = "firstName")]
    first_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    error: Option<String>,
}

impl HttpMailer {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(format!("failed to build mailer client: {err}")))?;

        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_welcome(&self, email: &str, first_name: &str) -> Result<SendReceipt, MailError> {
        let response: SendResponse = self
            .http
            .post(self.endpoint.clone())
            .json(&SendRequest { email, first_name })
            .send()
            .await
            .map_err(|err| MailError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| MailError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| MailError::Decode(err.to_string()))?;

        if response.success {
            Ok(SendReceipt {
                message_id: response.message_id,
            })
        } else {
            Err(MailError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "send function reported failure".to_string()),
            ))
        }
    }
}
