use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::error::CoreError;

pub mod password;
pub mod roles;
pub mod session;

/// Access-token claims. The role stamped here is the *effective* role
/// computed by the RoleResolver at issuance or refresh time; the admin route
/// tier trusts it for the lifetime of the token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: Uuid, name: String, email: String, role: roles::Role) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub,
            name,
            email,
            role: role.as_str().to_string(),
            exp,
            iat: now.timestamp(),
        }
    }
}

pub fn generate_jwt(claims: &Claims) -> Result<String, CoreError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(CoreError::internal("JWT secret not configured"));
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| CoreError::internal(format!("JWT generation error: {}", e)))
}

pub fn validate_jwt(token: &str) -> Result<Claims, CoreError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(CoreError::internal("JWT secret not configured"));
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| CoreError::unauthenticated(format!("invalid token: {}", e)))
}
