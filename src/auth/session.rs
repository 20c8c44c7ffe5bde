use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::Identity;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to sign session token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("Invalid session token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Identity recovered from a session token, without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
}

/// Issues and verifies stateless session tokens.
pub trait SessionCodec: Send + Sync {
    fn issue(&self, identity: &Identity) -> Result<String, SessionError>;

    fn verify(&self, token: &str) -> Result<SessionUser, SessionError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// Longest session lifetime accepted from configuration (ten years).
pub const MAX_SESSION_HOURS: u64 = 24 * 365 * 10;

/// HS256 JWT sessions.
pub struct JwtSessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtSessionCodec {
    pub fn new(secret: &[u8], lifetime_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime: Duration::hours(lifetime_hours.min(MAX_SESSION_HOURS) as i64),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, SessionError> {
        encode(&Header::default(), claims, &self.encoding).map_err(SessionError::Signing)
    }
}

impl SessionCodec for JwtSessionCodec {
    fn issue(&self, identity: &Identity) -> Result<String, SessionError> {
        let now = Utc::now();
        self.sign(&Claims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        })
    }

    fn verify(&self, token: &str) -> Result<SessionUser, SessionError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(SessionError::Invalid)?;
        Ok(SessionUser {
            id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

/// Random 32-byte hex secret, used when none is configured.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

// -- Cookie helpers --

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours.checked_mul(3600).unwrap_or(u64::MAX);
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// Session token from the named cookie, falling back to a bearer header.
pub fn extract_session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            (key == cookie_name && !val.is_empty()).then_some(val)
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    })
}
