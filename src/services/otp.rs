use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::DateTime;
use rand::Rng;

use crate::config::OtpConfig;
use crate::db::{DbConn, StoreError};
use crate::models::{OtpRecord, OtpReservation, PendingRegistration};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// Generates codes and decides, per user, whether a new one may be sent.
pub struct OtpManager {
    store: DbConn,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    code_length: usize,
}

impl OtpManager {
    pub fn new(store: DbConn, clock: Arc<dyn Clock>, config: &OtpConfig) -> Self {
        OtpManager {
            store,
            clock,
            cooldown: Duration::from_secs(config.cooldown_secs),
            code_length: config.code_length,
        }
    }

    /// Every digit is drawn independently, so leading zeros are as likely
    /// as any other digit.
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    /// Seconds left on `record`'s cooldown as of now, if any.
    pub fn cooldown_remaining(&self, record: &OtpRecord) -> Option<u64> {
        record.cooldown_remaining(self.clock.now(), self.cooldown)
    }

    /// Persists the code unless the previous one went out less than a
    /// cooldown ago. The cooldown runs from the last send.
    pub async fn save(
        &self,
        registration: &PendingRegistration,
    ) -> Result<OtpReservation, StoreError> {
        let now = self.clock.now();
        self.store.reserve_otp(registration, now, self.cooldown).await
    }
}
