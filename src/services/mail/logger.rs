use log::warn;

use super::{MailError, MailTransport};

/// Development transport: writes the message to the log instead of
/// delivering it.
pub struct LogMailer;

#[rocket::async_trait]
impl MailTransport for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        warn!("Mail delivery disabled; to={} subject={:?} body={:?}", to, subject, body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
