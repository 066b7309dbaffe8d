use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::AuthProvider;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User email
    pub provider: AuthProvider,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

pub struct JwtService {
    encoding: EncodingKey,
    #[cfg(test)]
    decoding: jsonwebtoken::DecodingKey,
    expiry_secs: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        JwtService {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            #[cfg(test)]
            decoding: jsonwebtoken::DecodingKey::from_secret(config.secret.as_bytes()),
            expiry_secs: config.expiry_secs,
        }
    }

    pub fn generate_session_token(
        &self,
        email: &str,
        provider: AuthProvider,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: email.to_string(),
            provider,
            exp: now + self.expiry_secs,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
    }

    #[cfg(test)]
    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding,
            &jsonwebtoken::Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}
