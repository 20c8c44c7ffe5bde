use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

use crate::auth::password::{PasswordError, PasswordHasher};
use crate::db::users::UserRepository;
use crate::db::RepositoryError;

/// Reset tokens expire one hour after issue.
pub const RESET_TOKEN_TTL_MS: i64 = 3_600_000;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("No account with that email address exists.")]
    NoAccount,

    #[error("Password reset token is invalid or has expired.")]
    TokenInvalid,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// A freshly issued reset token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue, probe and redeem single-use password reset tokens.
#[derive(Clone)]
pub struct PasswordResets {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
}

impl PasswordResets {
    pub fn new(users: Arc<dyn UserRepository>, hasher: PasswordHasher) -> Self {
        Self { users, hasher }
    }

    /// Store a new token on the account registered under `email`, replacing
    /// any earlier one. The token is returned to the caller rather than mailed.
    pub async fn issue(&self, email: &str, now: DateTime<Utc>) -> Result<IssuedToken, ResetError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ResetError::NoAccount)?;

        let token = generate_reset_token();
        let expires_at = now + Duration::milliseconds(RESET_TOKEN_TTL_MS);
        self.users
            .set_reset_token(&user.id, &token, expires_at)
            .await?;

        tracing::info!("Issued password reset token for user {}", user.id);
        Ok(IssuedToken { token, expires_at })
    }

    /// Read-only probe. A missing or empty token is invalid without a lookup.
    pub async fn validate(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, ResetError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        Ok(self.users.find_by_reset_token(token, now).await?.is_some())
    }

    /// Replace the password of the account holding `token`. The hash update
    /// and the token clear are one conditional write, so a token can succeed
    /// at most once even under concurrent redemption.
    pub async fn redeem(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ResetError> {
        let Some(user) = self.users.find_by_reset_token(token, now).await? else {
            tracing::warn!("Rejected invalid or expired password reset token");
            return Err(ResetError::TokenInvalid);
        };

        let password_hash = self.hasher.hash(new_password)?;
        if !self
            .users
            .redeem_reset_token(token, now, &password_hash)
            .await?
        {
            tracing::warn!("Password reset token for user {} was already used", user.id);
            return Err(ResetError::TokenInvalid);
        }

        tracing::info!("Password reset completed for user {}", user.id);
        Ok(())
    }
}

/// 32 random bytes, hex encoded.
fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
