use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::AuthProvider;

/// The code most recently sent to a pending registration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OtpRecord {
    pub code: String,
    pub last_sent_at: DateTime,
}

impl OtpRecord {
    /// Whole seconds left before another code may be sent, or `None` once
    /// the cooldown has elapsed. Always within `1..=cooldown` when `Some`.
    pub fn cooldown_remaining(&self, now: DateTime, cooldown: Duration) -> Option<u64> {
        let cooldown_ms = cooldown.as_millis() as i64;
        let elapsed_ms = now.timestamp_millis() - self.last_sent_at.timestamp_millis();

        if elapsed_ms >= cooldown_ms {
            return None;
        }

        // Clock skew can make elapsed negative; never ask for more than a full cooldown.
        let remaining_ms = (cooldown_ms - elapsed_ms).min(cooldown_ms);
        Some(((remaining_ms + 999) / 1000) as u64)
    }
}

/// Everything a registration attempt wants persisted alongside a new code.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub email: String,
    pub password_hash: String,
    pub provider: AuthProvider,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpReservation {
    /// The code was stored and the cooldown restarted.
    Issued,
    /// Still cooling down; nothing was written.
    Wait { seconds: u64 },
    /// The email belongs to a completed account.
    AlreadyRegistered,
}
