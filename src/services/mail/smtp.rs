use std::time::Duration;

use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use log::info;

use super::{MailError, MailTransport};
use crate::config::SmtpConfig;

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpMailer {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = Mailbox::new(config.from_name.clone(), config.from_address.parse()?);
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        // 465 speaks TLS from the first byte; anything else upgrades with STARTTLS.
        let builder = if config.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.host)?
        } else {
            SmtpTransport::starttls_relay(&config.host)?
        };

        let mailer = builder
            .port(config.port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(SmtpMailer { mailer, from })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
        let to_mailbox: Mailbox = to.parse()?;

        Ok(Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?)
    }
}

#[rocket::async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = self.build_message(to, subject, body)?;
        let mailer = self.mailer.clone();

        info!("Attempting to send email to: {}", to);
        // lettre's SmtpTransport blocks on network I/O.
        tokio::task::spawn_blocking(move || mailer.send(&message)).await??;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
