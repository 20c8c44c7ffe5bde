use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{NewComment, NewPost, PostDetail, PostSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{id}", get(get_post))
        .route("/api/posts/{id}/comments", post(create_comment))
}

/// Fields are stored as sent; presence is only enforced by the store.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateCommentRequest {
    pub name: Option<String>,
    pub message: Option<String>,
}

/// GET /api/posts
async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostSummary>>> {
    Ok(Json(state.posts.list().await?))
}

/// GET /api/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostDetail>> {
    state
        .posts
        .find(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let post = state
        .posts
        .create(
            &NewPost {
                title: req.title,
                description: req.description,
                body: req.body,
                author_id: user.id,
            },
            Utc::now(),
        )
        .await?;

    tracing::info!("User {} created post {}", user.username, post.id);
    Ok(Json(json!({
        "message": "Blog Post posted successfully!",
        "post": post,
    })))
}

/// POST /api/posts/{id}/comments: the display name is free text, separate
/// from the session identity that becomes the author.
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    JsonBody(req): JsonBody<CreateCommentRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let comment = state
        .posts
        .add_comment(
            &NewComment {
                name: req.name,
                message: req.message,
                post_id,
                author_id: user.id,
            },
            Utc::now(),
        )
        .await?;

    tracing::info!(
        "User {} commented on post {}",
        user.username,
        comment.post_id
    );
    Ok(Json(json!({
        "message": "Comment added to the Post successfully!",
        "comment": comment,
    })))
}
