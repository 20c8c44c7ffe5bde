use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

use crate::db::models::{
    from_millis, to_millis, AuthorName, Comment, CommentWithAuthor, NewComment, NewPost, Post,
    PostDetail, PostSummary,
};
use crate::db::RepositoryError;
use crate::state::DbPool;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// All posts, newest first, each with its author and raw comment rows.
    async fn list(&self) -> Result<Vec<PostSummary>, RepositoryError>;

    /// One post with its comments newest first, each carrying the commenter's
    /// username.
    async fn find(&self, id: &str) -> Result<Option<PostDetail>, RepositoryError>;

    async fn create(
        &self,
        post: &NewPost,
        created_at: DateTime<Utc>,
    ) -> Result<Post, RepositoryError>;

    /// Insert a comment. The post id is not checked up front; the foreign key
    /// rejects dangling references.
    async fn add_comment(
        &self,
        comment: &NewComment,
        created_at: DateTime<Utc>,
    ) -> Result<Comment, RepositoryError>;
}

pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// Columns 0..=5 of every post query.
fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        body: row.get(3)?,
        created_at: from_millis(row.get(4)?),
        author_id: row.get(5)?,
    })
}

// Columns 0..=5 of every comment query.
fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        name: row.get(1)?,
        message: row.get(2)?,
        post_id: row.get(3)?,
        author_id: row.get(4)?,
        created_at: from_millis(row.get(5)?),
    })
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn list(&self) -> Result<Vec<PostSummary>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.description, p.body, p.created_at, p.author_id, u.username
             FROM posts p JOIN users u ON u.id = p.author_id
             ORDER BY p.created_at DESC, p.id DESC",
        )?;
        let posts: Vec<(Post, String)> = stmt
            .query_map([], |row| Ok((post_from_row(row)?, row.get(6)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, message, post_id, author_id, created_at
             FROM comments ORDER BY created_at ASC, id ASC",
        )?;
        let mut comments_by_post: HashMap<String, Vec<Comment>> = HashMap::new();
        for comment in stmt.query_map([], comment_from_row)? {
            let comment = comment?;
            comments_by_post
                .entry(comment.post_id.clone())
                .or_default()
                .push(comment);
        }

        Ok(posts
            .into_iter()
            .map(|(post, username)| {
                let comments = comments_by_post.remove(&post.id).unwrap_or_default();
                PostSummary {
                    post,
                    author: AuthorName { username },
                    comments,
                }
            })
            .collect())
    }

    async fn find(&self, id: &str) -> Result<Option<PostDetail>, RepositoryError> {
        let conn = self.pool.get()?;

        let found = conn
            .query_row(
                "SELECT p.id, p.title, p.description, p.body, p.created_at, p.author_id, u.username
                 FROM posts p JOIN users u ON u.id = p.author_id
                 WHERE p.id = ?1",
                params![id],
                |row| Ok((post_from_row(row)?, row.get::<_, String>(6)?)),
            )
            .optional()?;

        let Some((post, username)) = found else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.message, c.post_id, c.author_id, c.created_at, u.username
             FROM comments c JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at DESC, c.id DESC",
        )?;
        let comments = stmt
            .query_map(params![id], |row| {
                Ok(CommentWithAuthor {
                    comment: comment_from_row(row)?,
                    author: AuthorName {
                        username: row.get(6)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PostDetail {
            post,
            author: AuthorName { username },
            comments,
        }))
    }

    async fn create(
        &self,
        post: &NewPost,
        created_at: DateTime<Utc>,
    ) -> Result<Post, RepositoryError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO posts (id, title, description, body, author_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                post.title,
                post.description,
                post.body,
                post.author_id,
                to_millis(created_at)
            ],
        )?;

        let created = conn.query_row(
            "SELECT id, title, description, body, created_at, author_id FROM posts WHERE id = ?1",
            params![id],
            post_from_row,
        )?;
        Ok(created)
    }

    async fn add_comment(
        &self,
        comment: &NewComment,
        created_at: DateTime<Utc>,
    ) -> Result<Comment, RepositoryError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO comments (id, name, message, post_id, author_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                comment.name,
                comment.message,
                comment.post_id,
                comment.author_id,
                to_millis(created_at)
            ],
        )?;

        let created = conn.query_row(
            "SELECT id, name, message, post_id, author_id, created_at FROM comments WHERE id = ?1",
            params![id],
            comment_from_row,
        )?;
        Ok(created)
    }
}
