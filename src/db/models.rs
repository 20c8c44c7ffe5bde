use chrono::{DateTime, Utc};
use serde::Serialize;

/// Full user row. Deliberately not `Serialize`: the password hash and reset
/// token must never reach a response body.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// The `{id, username, email}` projection returned after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Whitelisted profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
}

/// Partial profile write. For the text fields `None` leaves the column as is
/// and `Some(None)` clears it; `age` is always written.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub age: Option<i64>,
    pub gender: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub website: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
}

/// Post fields as received. Missing values are left for the store's NOT NULL
/// constraints to reject.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub author_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub message: String,
    pub post_id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub name: Option<String>,
    pub message: Option<String>,
    pub post_id: String,
    pub author_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorName {
    pub username: String,
}

/// Entry of the post listing: the post, its author's username and the raw
/// comment rows.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorName,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: AuthorName,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorName,
    pub comments: Vec<CommentWithAuthor>,
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
