//! Outbound mail. Handlers only see [`MailTransport`]; which
//! implementation backs it is decided by `mail.transport` at startup.

use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::config::{MailConfig, MailTransportKind};

pub mod logger;
#[cfg(test)]
pub mod mock;
pub mod sendgrid;
pub mod smtp;

pub use logger::LogMailer;
pub use sendgrid::SendGridMailer;
pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message ({status}): {body}")]
    Provider { status: u16, body: String },

    #[error("mail worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("mail transport `{0}` is not configured")]
    NotConfigured(&'static str),
}

#[rocket::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;

    fn name(&self) -> &'static str;
}

pub type Mailer = Arc<dyn MailTransport>;

pub fn from_config(config: &MailConfig) -> Result<Mailer, MailError> {
    let mailer: Mailer = match config.transport {
        MailTransportKind::Smtp => {
            let smtp = config.smtp.as_ref().ok_or(MailError::NotConfigured("smtp"))?;
            Arc::new(SmtpMailer::new(smtp)?)
        }
        MailTransportKind::Sendgrid => {
            let sendgrid = config
                .sendgrid
                .as_ref()
                .ok_or(MailError::NotConfigured("sendgrid"))?;
            Arc::new(SendGridMailer::new(sendgrid)?)
        }
        MailTransportKind::Log => Arc::new(LogMailer),
    };

    info!("Mail transport: {}", mailer.name());
    Ok(mailer)
}
