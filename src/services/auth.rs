use log::debug;
use thiserror::Error;

use crate::db::{DbConn, StoreError};
use crate::models::AuthProvider;
use crate::services::JwtService;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Password hashing and credential checks for locally-authenticated users.
pub struct AuthService {
    store: DbConn,
    jwt: JwtService,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: DbConn, jwt: JwtService, bcrypt_cost: u32) -> Self {
        AuthService {
            store,
            jwt,
            bcrypt_cost,
        }
    }

    #[cfg(test)]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// bcrypt is deliberately slow, so it runs on the blocking pool.
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    /// Returns a session token when the credentials match a local user.
    /// Unknown emails, wrong passwords and externally-authenticated users
    /// all come back as `None`.
    pub async fn verify(&self, email: &str, password: &str) -> Result<Option<String>, AuthError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            debug!("Login for unknown email {}", email);
            return Ok(None);
        };

        if user.provider != AuthProvider::Local {
            debug!("Password login attempted for {} user {}", user.provider.as_str(), email);
            return Ok(None);
        }

        let password = password.to_string();
        let hash = user.password.clone();
        if !tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?? {
            return Ok(None);
        }

        let token = self.jwt.generate_session_token(&user.email, user.provider)?;
        Ok(Some(token))
    }
}
