//! Brevo transactional email adapter.
//!
//! Speaks the `smtp/email` JSON endpoint with api-key header auth. Any reply
//! from the service comes back as a `TransportResponse` for the delivery
//! worker to classify; only a failure to get a reply at all is an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use smsfwd_core::domain::OutboundEmail;
use smsfwd_core::ports::{EmailTransport, TransportResponse};
use smsfwd_core::{Error, Result};

/// Endpoint used when no override is configured.
pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Clone, Debug)]
pub struct BrevoTransport {
    api_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct Party<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Party<'a>,
    to: Vec<Party<'a>>,
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
}

impl<'a> SendEmailRequest<'a> {
    fn from_email(email: &'a OutboundEmail) -> Self {
        Self {
            sender: Party {
                name: &email.sender_name,
                email: &email.sender_address,
            },
            to: vec![Party {
                name: &email.target_name,
                email: &email.target_address,
            }],
            subject: &email.subject,
            html_content: &email.html_body,
            text_content: &email.text_body,
        }
    }
}

impl BrevoTransport {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            api_url: api_url.into(),
            http,
        }
    }
}

#[async_trait]
impl EmailTransport for BrevoTransport {
    async fn send(&self, credential: &str, email: &OutboundEmail) -> Result<TransportResponse> {
        let resp = self
            .http
            .post(&self.api_url)
            .header("api-key", credential)
            .header("accept", "application/json")
            .json(&SendEmailRequest::from_email(email))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("brevo request error: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}
