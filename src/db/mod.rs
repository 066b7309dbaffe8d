use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use mongodb::bson::DateTime;
use thiserror::Error;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::models::{OtpReservation, PendingRegistration, User};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(test)]
    #[error("user {0} already exists")]
    Duplicate(String),

    #[error("registration for {0} changed while it was being updated")]
    Contended(String),
}

#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Seeds a completed account.
    #[cfg(test)]
    async fn insert(&self, user: User) -> Result<(), StoreError>;

    /// Stores `registration`'s code for its email unless the last code was
    /// sent less than `cooldown` before `now`. Decide-and-write is atomic
    /// per email, so concurrent callers cannot both be issued a code.
    async fn reserve_otp(
        &self,
        registration: &PendingRegistration,
        now: DateTime,
        cooldown: Duration,
    ) -> Result<OtpReservation, StoreError>;
}

pub type DbConn = Arc<dyn UserStore>;

pub async fn connect(config: &DatabaseConfig) -> Result<DbConn, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory user store; registrations are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Mongodb => {
            let store = MongoStore::connect(&config.uri, &config.name).await?;
            info!("✓ MongoDB connected successfully");
            Ok(Arc::new(store))
        }
    }
}
