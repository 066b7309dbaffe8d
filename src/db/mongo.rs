use std::time::Duration;

use log::{debug, info};
use mongodb::bson::{DateTime, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::db::{StoreError, UserStore};
use crate::models::{OtpReservation, PendingRegistration, User};

const USERS: &str = "users";
const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;

        // Test connection
        client
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await?;

        let store = MongoStore {
            db: client.database(database),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection::<User>(USERS)
    }

    /// The unique email index is what makes the upsert in `reserve_otp`
    /// safe under concurrency.
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.users().create_index(index, None).await?;
        info!("Ensured unique index on {}.email", USERS);
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[rocket::async_trait]
impl UserStore for MongoStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    #[cfg(test)]
    async fn insert(&self, user: User) -> Result<(), StoreError> {
        match self.users().insert_one(&user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate(user.email)),
            Err(e) => Err(e.into()),
        }
    }

    async fn reserve_otp(
        &self,
        registration: &PendingRegistration,
        now: DateTime,
        cooldown: Duration,
    ) -> Result<OtpReservation, StoreError> {
        let cutoff = DateTime::from_millis(now.timestamp_millis() - cooldown.as_millis() as i64);

        // Matches only a pending registration whose cooldown is over. Anything
        // else makes the upsert collide with the unique email index.
        let filter = doc! {
            "email": &registration.email,
            "pending_otp.last_sent_at": { "$lte": cutoff },
        };
        let update = doc! {
            "$set": {
                "password": &registration.password_hash,
                "provider": registration.provider.as_str(),
                "pending_otp": {
                    "code": &registration.code,
                    "last_sent_at": now,
                },
                "updated_at": now,
            },
            "$setOnInsert": { "created_at": now },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        match self.users().find_one_and_update(filter, update, options).await {
            Ok(_) => Ok(OtpReservation::Issued),
            Err(e) if is_duplicate_key(&e) => {
                debug!("OTP reservation for {} lost to an existing record", registration.email);

                let existing = self
                    .find_by_email(&registration.email)
                    .await?
                    .ok_or_else(|| StoreError::Contended(registration.email.clone()))?;

                match existing.pending_otp {
                    None => Ok(OtpReservation::AlreadyRegistered),
                    Some(otp) => Ok(OtpReservation::Wait {
                        // The winner may already be past its cooldown by the time we read it.
                        seconds: otp.cooldown_remaining(now, cooldown).unwrap_or(1),
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
