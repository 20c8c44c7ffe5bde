use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::auth::password::{PasswordError, PasswordHasher};
use crate::db::models::{Identity, NewUser};
use crate::db::users::UserRepository;
use crate::db::RepositoryError;

pub const INVALID_CREDENTIALS: &str = "Invalid username/password, Try again!";
pub const DUPLICATE_ACCOUNT: &str = "Username or email already exists";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Same error for every rejection so callers cannot tell which part was wrong.
    #[error("Invalid username/password, Try again!")]
    InvalidCredentials,

    #[error("Username or email already exists")]
    DuplicateAccount,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Registration and credential checks against the user store.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserRepository>, hasher: PasswordHasher) -> Self {
        Self { users, hasher }
    }

    /// Create an account after checking that neither the username nor the
    /// email is taken. The check and the insert are separate statements; a
    /// racing insert is caught by the store's unique constraints and reported
    /// the same way.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        if self
            .users
            .find_by_username_or_email(username, email)
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.hasher.hash(password)?;
        let user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        match self.users.create(&user, Utc::now()).await {
            Ok(id) => {
                tracing::info!("Registered user {} ({})", username, id);
                Ok(id)
            }
            Err(RepositoryError::Conflict(_)) => Err(AuthError::DuplicateAccount),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a username/password pair. Missing or empty values, an unknown
    /// username and a wrong password all yield `InvalidCredentials`.
    pub async fn authorize(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let (Some(username), Some(password)) = (
            username.filter(|u| !u.is_empty()),
            password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthError::InvalidCredentials);
        };

        let Some(user) = self.users.find_by_username(username).await? else {
            tracing::warn!("Login rejected: unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::warn!("Login rejected for {}: wrong password", user.username);
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Profile, ProfileUpdate, User};
    use crate::db::test_pool;
    use crate::db::users::SqliteUserRepository;
    use async_trait::async_trait;
    use chrono::DateTime;

    /// Store where another registration lands between the existence check
    /// and the insert: lookups find nothing, the insert hits the constraint.
    struct RacedUsers;

    #[async_trait]
    impl UserRepository for RacedUsers {
        async fn find_by_username(&self, _: &str) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn find_by_email(&self, _: &str) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn find_by_username_or_email(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn create(
            &self,
            user: &NewUser,
            _: DateTime<Utc>,
        ) -> Result<String, RepositoryError> {
            Err(RepositoryError::Conflict(user.username.clone()))
        }

        async fn set_reset_token(
            &self,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            unimplemented!()
        }

        async fn find_by_reset_token(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<Option<User>, RepositoryError> {
            unimplemented!()
        }

        async fn redeem_reset_token(
            &self,
            _: &str,
            _: DateTime<Utc>,
            _: &str,
        ) -> Result<bool, RepositoryError> {
            unimplemented!()
        }

        async fn profile(&self, _: &str) -> Result<Option<Profile>, RepositoryError> {
            unimplemented!()
        }

        async fn update_profile(
            &self,
            _: &str,
            _: &ProfileUpdate,
        ) -> Result<bool, RepositoryError> {
            unimplemented!()
        }
    }

    fn authenticator() -> Authenticator {
        Authenticator::new(
            Arc::new(SqliteUserRepository::new(test_pool())),
            PasswordHasher::new(4 /* bcrypt minimum cost */),
        )
    }

    #[tokio::test]
    async fn register_then_authorize_returns_identity_projection() {
        let auth = authenticator();
        let id = auth
            .register("testuser", "test@example.com", "correctpassword")
            .await
            .unwrap();

        let identity = auth
            .authorize(Some("testuser"), Some("correctpassword"))
            .await
            .unwrap();
        assert_eq!(
            identity,
            Identity {
                id,
                username: "testuser".into(),
                email: "test@example.com".into(),
            }
        );
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let auth = authenticator();
        auth.register("alice", "alice@example.com", "pw").await.unwrap();

        let same_name = auth.register("alice", "new@example.com", "pw").await;
        assert!(matches!(same_name, Err(AuthError::DuplicateAccount)));

        let same_email = auth.register("bob", "alice@example.com", "pw").await;
        assert!(matches!(same_email, Err(AuthError::DuplicateAccount)));
    }

    #[tokio::test]
    async fn every_rejection_has_the_same_message() {
        let auth = authenticator();
        auth.register("testuser", "test@example.com", "secret")
            .await
            .unwrap();

        let attempts = [
            (None, None),
            (Some("testuser"), None),
            (None, Some("secret")),
            (Some(""), Some("secret")),
            (Some("testuser"), Some("")),
            (Some("nonexistent"), Some("secret")),
            (Some("testuser"), Some("wrongpassword")),
        ];
        for (username, password) in attempts {
            let err = auth.authorize(username, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(err.to_string(), INVALID_CREDENTIALS);
        }
    }

    #[tokio::test]
    async fn stored_hash_is_not_the_plaintext() {
        let pool = test_pool();
        let users = Arc::new(SqliteUserRepository::new(pool));
        let auth = Authenticator::new(users.clone(), PasswordHasher::new(4 /* bcrypt minimum cost */));
        auth.register("alice", "alice@example.com", "plaintext")
            .await
            .unwrap();

        let user = users.find_by_username("alice").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "plaintext");
        assert!(user.password_hash.starts_with("$2b$"));
    }

    #[tokio::test]
    async fn conflict_on_insert_is_reported_as_duplicate() {
        let auth = Authenticator::new(Arc::new(RacedUsers), PasswordHasher::new(4 /* bcrypt minimum cost */));

        let err = auth
            .register("alice", "alice@example.com", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount));
        assert_eq!(err.to_string(), DUPLICATE_ACCOUNT);
    }
}
