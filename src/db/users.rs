use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{from_millis, to_millis, NewUser, Profile, ProfileUpdate, User};
use crate::db::RepositoryError;
use crate::state::DbPool;

/// Every read and write against the `users` table.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// First user whose username OR email matches.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Insert a user and return its id. A uniqueness violation on username or
    /// email is reported as `RepositoryError::Conflict`.
    async fn create(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<String, RepositoryError>;

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// User holding `token` whose expiry is strictly after `now`.
    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;

    /// Replace the password hash and clear the reset token in one conditional
    /// write. Returns false when no unexpired row held the token.
    async fn redeem_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<bool, RepositoryError>;

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError>;

    /// Returns false when the user does not exist.
    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<bool, RepositoryError>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, reset_token, reset_token_expiry, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        reset_token: row.get(4)?,
        reset_token_expiry: row.get(5)?,
        created_at: from_millis(row.get(6)?),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1"
                ),
                params![username, email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn create(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<String, RepositoryError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                user.username,
                user.email,
                user.password_hash,
                to_millis(created_at)
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("user {} / {}", user.username, user.email))
            } else {
                e.into()
            }
        })?;

        Ok(id)
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users SET reset_token = ?1, reset_token_expiry = ?2 WHERE id = ?3",
            params![token, to_millis(expires_at), user_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users
                     WHERE reset_token = ?1 AND reset_token_expiry > ?2
                     LIMIT 1"
                ),
                params![token, to_millis(now)],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users
             SET password_hash = ?1, reset_token = NULL, reset_token_expiry = NULL
             WHERE reset_token = ?2 AND reset_token_expiry > ?3",
            params![password_hash, token, to_millis(now)],
        )?;
        Ok(rows > 0)
    }

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                "SELECT id, username, email, first_name, last_name, age, gender, address, website
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(Profile {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        first_name: row.get(3)?,
                        last_name: row.get(4)?,
                        age: row.get(5)?,
                        gender: row.get(6)?,
                        address: row.get(7)?,
                        website: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        // Each text column gets a (present, value) pair so absent fields keep
        // their stored value.
        let rows = conn.execute(
            "UPDATE users SET
                first_name = CASE WHEN ?2 THEN ?3 ELSE first_name END,
                last_name  = CASE WHEN ?4 THEN ?5 ELSE last_name END,
                gender     = CASE WHEN ?6 THEN ?7 ELSE gender END,
                address    = CASE WHEN ?8 THEN ?9 ELSE address END,
                website    = CASE WHEN ?10 THEN ?11 ELSE website END,
                age        = ?12
             WHERE id = ?1",
            params![
                user_id,
                update.first_name.is_some(),
                update.first_name.clone().flatten(),
                update.last_name.is_some(),
                update.last_name.clone().flatten(),
                update.gender.is_some(),
                update.gender.clone().flatten(),
                update.address.is_some(),
                update.address.clone().flatten(),
                update.website.is_some(),
                update.website.clone().flatten(),
                update.age,
            ],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_and_find_by_username_and_email() {
        let repo = SqliteUserRepository::new(test_pool());
        let id = repo
            .create(&new_user("alice", "alice@example.com"), Utc::now())
            .await
            .unwrap();

        let by_name = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, id);
        let by_email = repo
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, id);
        assert!(repo.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_username_or_email_matches_either_field() {
        let repo = SqliteUserRepository::new(test_pool());
        repo.create(&new_user("alice", "alice@example.com"), Utc::now())
            .await
            .unwrap();

        assert!(repo
            .find_by_username_or_email("alice", "new@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_username_or_email("newbie", "alice@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_username_or_email("newbie", "new@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let repo = SqliteUserRepository::new(test_pool());
        repo.create(&new_user("alice", "alice@example.com"), Utc::now())
            .await
            .unwrap();

        let err = repo
            .create(&new_user("alice", "other@example.com"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn reset_token_lookup_uses_strict_expiry() {
        let repo = SqliteUserRepository::new(test_pool());
        let id = repo
            .create(&new_user("alice", "alice@example.com"), Utc::now())
            .await
            .unwrap();
        let expiry = Utc::now() + Duration::hours(1);
        repo.set_reset_token(&id, "tok", expiry).await.unwrap();

        let before = expiry - Duration::milliseconds(1);
        assert!(repo.find_by_reset_token("tok", before).await.unwrap().is_some());
        assert!(repo.find_by_reset_token("tok", expiry).await.unwrap().is_none());
        assert!(repo.find_by_reset_token("other", before).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn redeem_clears_token_and_only_succeeds_once() {
        let repo = SqliteUserRepository::new(test_pool());
        let id = repo
            .create(&new_user("alice", "alice@example.com"), Utc::now())
            .await
            .unwrap();
        let now = Utc::now();
        repo.set_reset_token(&id, "tok", now + Duration::hours(1))
            .await
            .unwrap();

        assert!(repo.redeem_reset_token("tok", now, "new-hash").await.unwrap());
        assert!(!repo.redeem_reset_token("tok", now, "newer-hash").await.unwrap());

        let user = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert!(user.reset_token.is_none());
        assert!(user.reset_token_expiry.is_none());
    }

    #[tokio::test]
    async fn set_reset_token_for_missing_user_is_not_found() {
        let repo = SqliteUserRepository::new(test_pool());
        let err = repo
            .set_reset_token("ghost", "tok", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_profile_keeps_absent_fields_and_clears_null_ones() {
        let repo = SqliteUserRepository::new(test_pool());
        let id = repo
            .create(&new_user("alice", "alice@example.com"), Utc::now())
            .await
            .unwrap();

        let first = ProfileUpdate {
            first_name: Some(Some("Alice".into())),
            last_name: Some(Some("Liddell".into())),
            age: Some(30),
            website: Some(Some("https://example.com".into())),
            ..Default::default()
        };
        assert!(repo.update_profile(&id, &first).await.unwrap());

        let second = ProfileUpdate {
            last_name: Some(None),
            website: Some(Some(String::new())),
            age: None,
            ..Default::default()
        };
        assert!(repo.update_profile(&id, &second).await.unwrap());

        let profile = repo.profile(&id).await.unwrap().unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Alice"));
        assert_eq!(profile.last_name, None);
        assert_eq!(profile.website.as_deref(), Some(""));
        assert_eq!(profile.age, None);
    }

    #[tokio::test]
    async fn update_profile_for_missing_user_reports_false() {
        let repo = SqliteUserRepository::new(test_pool());
        let updated = repo
            .update_profile("ghost", &ProfileUpdate::default())
            .await
            .unwrap();
        assert!(!updated);
        assert!(repo.profile("ghost").await.unwrap().is_none());
    }
}
