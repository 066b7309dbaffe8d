use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbConn;

pub mod auth;
pub mod jwt;
pub mod mail;
pub mod otp;

pub use auth::{AuthError, AuthService};
pub use jwt::JwtService;
pub use mail::Mailer;
pub use otp::{Clock, OtpManager, SystemClock};

/// Everything a request handler needs, assembled once at startup.
pub struct AppState {
    pub store: DbConn,
    pub otp: OtpManager,
    pub mailer: Mailer,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: &AppConfig, store: DbConn, mailer: Mailer, clock: Arc<dyn Clock>) -> Self {
        AppState {
            otp: OtpManager::new(store.clone(), clock, &config.otp),
            auth: AuthService::new(store.clone(), JwtService::new(&config.jwt), config.bcrypt_cost),
            store,
            mailer,
        }
    }
}
