use std::collections::HashMap;
use std::time::Duration;

use mongodb::bson::DateTime;
use tokio::sync::Mutex;

use crate::db::{StoreError, UserStore};
use crate::models::{OtpRecord, OtpReservation, PendingRegistration, User};

/// Process-local store keyed by email.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(email).cloned())
    }

    #[cfg(test)]
    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::Duplicate(user.email));
        }
        users.insert(user.email.clone(), user);
        Ok(())
    }

    async fn reserve_otp(
        &self,
        registration: &PendingRegistration,
        now: DateTime,
        cooldown: Duration,
    ) -> Result<OtpReservation, StoreError> {
        let mut users = self.users.lock().await;
        let otp = OtpRecord {
            code: registration.code.clone(),
            last_sent_at: now,
        };

        let Some(user) = users.get_mut(&registration.email) else {
            users.insert(
                registration.email.clone(),
                User {
                    id: None,
                    email: registration.email.clone(),
                    password: registration.password_hash.clone(),
                    provider: registration.provider,
                    pending_otp: Some(otp),
                    created_at: now,
                    updated_at: now,
                },
            );
            return Ok(OtpReservation::Issued);
        };

        let Some(current) = &user.pending_otp else {
            return Ok(OtpReservation::AlreadyRegistered);
        };

        if let Some(seconds) = current.cooldown_remaining(now, cooldown) {
            return Ok(OtpReservation::Wait { seconds });
        }

        user.password = registration.password_hash.clone();
        user.provider = registration.provider;
        user.pending_otp = Some(otp);
        user.updated_at = now;
        Ok(OtpReservation::Issued)
    }
}
