use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::env;
use thiserror::Error;

/// One day.
pub const MAX_COOLDOWN_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Extract(#[from] Box<rocket::figment::Error>),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Application settings, extracted once at startup and handed to the
/// services that need them.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_jwt_expiry")]
    pub expiry_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_mongodb_uri")]
    pub uri: String,
    #[serde(default = "default_database_name")]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    Smtp,
    Sendgrid,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_transport")]
    pub transport: MailTransportKind,
    pub smtp: Option<SmtpConfig>,
    pub sendgrid: Option<SendGridConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_address: String,
    pub from_name: Option<String>,
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

/// SendGrid data residency. EU-pinned subusers must call the EU host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendGridRegion {
    #[default]
    Global,
    Eu,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from_address: String,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
    #[serde(default)]
    pub region: SendGridRegion,
    /// Overrides the region host, e.g. to point at a local mock.
    pub api_base_url: Option<String>,
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_jwt_expiry() -> i64 {
    900
}

fn default_cooldown() -> u64 {
    60
}

fn default_code_length() -> usize {
    6
}

fn default_backend() -> StoreBackend {
    StoreBackend::Mongodb
}

fn default_mongodb_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "otp-auth".to_string()
}

fn default_transport() -> MailTransportKind {
    MailTransportKind::Smtp
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_timeout() -> u64 {
    10
}

impl Default for JwtConfig {
    fn default() -> Self {
        JwtConfig {
            secret: String::new(),
            expiry_secs: default_jwt_expiry(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        OtpConfig {
            cooldown_secs: default_cooldown(),
            code_length: default_code_length(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            backend: default_backend(),
            uri: default_mongodb_uri(),
            name: default_database_name(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            transport: default_transport(),
            smtp: None,
            sendgrid: None,
        }
    }
}

impl AppConfig {
    /// `App.toml` (profile selected by `APP_PROFILE`) overlaid with
    /// `APP_`-prefixed environment variables. Nested keys use `__`,
    /// e.g. `APP_MAIL__SMTP__HOST`.
    pub fn figment() -> Figment {
        let profile = env::var("APP_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::new()
            .merge(Toml::file("App.toml").nested())
            .select(profile)
            .merge(Env::prefixed("APP_").split("__").global())
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::Missing("jwt.secret"));
        }
        if self.jwt.expiry_secs <= 0 {
            return Err(ConfigError::Invalid {
                field: "jwt.expiry_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.otp.cooldown_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "otp.cooldown_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        if self.otp.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(ConfigError::Invalid {
                field: "otp.cooldown_secs",
                reason: format!("{} exceeds {}", self.otp.cooldown_secs, MAX_COOLDOWN_SECS),
            });
        }
        if !(4..=10).contains(&self.otp.code_length) {
            return Err(ConfigError::Invalid {
                field: "otp.code_length",
                reason: format!("{} is outside 4..=10", self.otp.code_length),
            });
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                field: "bcrypt_cost",
                reason: format!("{} is outside 4..=31", self.bcrypt_cost),
            });
        }
        if self.database.backend == StoreBackend::Mongodb && self.database.uri.trim().is_empty() {
            return Err(ConfigError::Missing("database.uri"));
        }

        match self.mail.transport {
            MailTransportKind::Smtp => {
                let smtp = self.mail.smtp.as_ref().ok_or(ConfigError::Missing("mail.smtp"))?;
                require(&smtp.host, "mail.smtp.host")?;
                require(&smtp.username, "mail.smtp.username")?;
                require(&smtp.password, "mail.smtp.password")?;
                require(&smtp.from_address, "mail.smtp.from_address")?;
            }
            MailTransportKind::Sendgrid => {
                let sendgrid = self
                    .mail
                    .sendgrid
                    .as_ref()
                    .ok_or(ConfigError::Missing("mail.sendgrid"))?;
                require(&sendgrid.api_key, "mail.sendgrid.api_key")?;
                require(&sendgrid.from_address, "mail.sendgrid.from_address")?;
            }
            MailTransportKind::Log => {}
        }

        Ok(())
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
impl AppConfig {
    /// In-memory store, log transport, cheapest bcrypt cost.
    pub fn test() -> Self {
        AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiry_secs: 900,
            },
            otp: OtpConfig::default(),
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                ..DatabaseConfig::default()
            },
            mail: MailConfig {
                transport: MailTransportKind::Log,
                smtp: None,
                sendgrid: None,
            },
            bcrypt_cost: 4,
        }
    }
}
