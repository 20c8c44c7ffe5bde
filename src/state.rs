use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::credentials::Authenticator;
use crate::auth::password::PasswordHasher;
use crate::auth::reset::PasswordResets;
use crate::auth::session::{generate_secret, JwtSessionCodec, SessionCodec};
use crate::config::Config;
use crate::db::posts::{PostRepository, SqlitePostRepository};
use crate::db::users::{SqliteUserRepository, UserRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub sessions: Arc<dyn SessionCodec>,
    pub auth: Authenticator,
    pub resets: PasswordResets,
}

impl AppState {
    /// Wire every component to the given pool. Without a configured secret a
    /// random one is generated, so sessions end when the process does.
    pub fn new(pool: DbPool, config: Config) -> Self {
        let secret = config.auth.secret.clone().unwrap_or_else(|| {
            tracing::warn!("No session secret configured; generating an ephemeral one");
            generate_secret()
        });
        let sessions = Arc::new(JwtSessionCodec::new(
            secret.as_bytes(),
            config.auth.session_hours,
        ));
        Self::with_sessions(pool, config, sessions)
    }

    pub fn with_sessions(pool: DbPool, config: Config, sessions: Arc<dyn SessionCodec>) -> Self {
        let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
        let posts: Arc<dyn PostRepository> = Arc::new(SqlitePostRepository::new(pool));
        let hasher = PasswordHasher::new(config.auth.bcrypt_cost);

        Self {
            auth: Authenticator::new(users.clone(), hasher),
            resets: PasswordResets::new(users.clone(), hasher),
            users,
            posts,
            sessions,
            config,
        }
    }
}
