use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub mod google;
pub mod password;

/// Payload of an issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Id of the authenticated user.
    pub id: Uuid,
    pub iat: i64,
    pub exp: i64,
    /// Random nonce, so tokens issued within the same second differ.
    pub jti: String,
}

/// HS256 keys plus the fixed token lifetime.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_seconds),
            validation: strict_validation(),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            id: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: format!("{:016x}", rand::random::<u64>()),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::warn!("Rejected bearer token: {}", e);
                AppError::AuthenticationFailed
            })
    }
}

/// HS256 with `exp` enforced to the second.
fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}

/// Extracts the token from an `Authorization` value, with or without the `Bearer ` prefix.
fn bearer_token(value: &str) -> &str {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .unwrap_or(value)
}

/// Gate for protected routes: on success the decoded [`Claims`] are placed
/// in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let value = request
        .headers()
        .get(AUTHORIZATION)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::AuthenticationRequired)?
        .to_str()
        .map_err(|_| AppError::AuthenticationFailed)?;

    let claims = state.tokens.verify(bearer_token(value))?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
