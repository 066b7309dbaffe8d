use std::time::Duration;

use log::info;
use reqwest::Client;
use serde::Serialize;

use super::{MailError, MailTransport};
use crate::config::{SendGridConfig, SendGridRegion};

const GLOBAL_API: &str = "https://api.sendgrid.com";
const EU_API: &str = "https://api.eu.sendgrid.com";
const SEND_PATH: &str = "/v3/mail/send";

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<EmailAddress<'a>>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

/// SendGrid v3 Mail Send client.
pub struct SendGridMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    from_address: String,
    from_name: Option<String>,
    reply_to: Option<String>,
}

impl SendGridMailer {
    pub fn new(config: &SendGridConfig) -> Result<Self, MailError> {
        let base = match (&config.api_base_url, config.region) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, SendGridRegion::Global) => GLOBAL_API.to_string(),
            (None, SendGridRegion::Eu) => EU_API.to_string(),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(SendGridMailer {
            client,
            endpoint: format!("{}{}", base, SEND_PATH),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
            reply_to: config.reply_to.clone(),
        })
    }

    fn request<'a>(&'a self, to: &'a str, subject: &'a str, body: &'a str) -> SendRequest<'a> {
        SendRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: to,
                    name: None,
                }],
            }],
            from: EmailAddress {
                email: &self.from_address,
                name: self.from_name.as_deref(),
            },
            reply_to: self.reply_to.as_deref().map(|email| EmailAddress { email, name: None }),
            subject,
            content: vec![Content {
                kind: "text/plain",
                value: body,
            }],
        }
    }
}

#[rocket::async_trait]
impl MailTransport for SendGridMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!("Attempting to send email to: {}", to);

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(to, subject, body))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "SendGrid error".to_string());
            return Err(MailError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
