use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::error::AppResult;
use crate::extractors::{JsonBody, MaybeUser};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// -- Account handlers --

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .auth
        .register(&req.username, &req.email, &req.password)
        .await?;

    Ok(Json(json!({ "message": "Registration successful" })))
}

/// POST /api/auth/login: verify credentials and set the session cookie.
/// A `null` body is treated like missing credentials.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Option<LoginRequest>>,
) -> AppResult<Response> {
    let req = req.unwrap_or_default();
    let identity = state
        .auth
        .authorize(req.username.as_deref(), req.password.as_deref())
        .await?;

    let token = state.sessions.issue(&identity)?;
    tracing::info!("User {} logged in", identity.username);

    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Login successful", "user": identity })),
    )
        .into_response())
}

/// POST /api/auth/logout: sessions are stateless, so this only expires the cookie.
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Json(json!({ "message": "Logged out" })),
    )
        .into_response()
}

/// GET /api/auth/session
pub async fn session(maybe_user: MaybeUser) -> Json<serde_json::Value> {
    let user = maybe_user
        .0
        .map(|user| json!({ "id": user.id, "username": user.username }));
    Json(json!({ "user": user }))
}

// -- Password reset handlers --

/// POST /api/auth/forgot-password: the token is handed back in the response.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let issued = state.resets.issue(&req.email, Utc::now()).await?;

    Ok(Json(json!({
        "message": "Password reset link has been sent to your email.",
        "token": issued.token,
    })))
}

/// GET /api/auth/reset-password?token=
///
/// Read as raw pairs so a repeated key never rejects the request; the first
/// `token` wins.
pub async fn check_reset_token(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<serde_json::Value>> {
    let token = first_param(&params, "token");
    let valid = state.resets.validate(token, Utc::now()).await?;

    Ok(Json(json!({ "valid": valid })))
}

fn first_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .resets
        .redeem(&req.token, &req.password, Utc::now())
        .await?;

    Ok(Json(json!({ "message": "Password has been reset successfully." })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn first_param_takes_the_earliest_value() {
        let params = pairs(&[("other", "x"), ("token", "a"), ("token", "b")]);
        assert_eq!(first_param(&params, "token"), Some("a"));
        assert_eq!(first_param(&params, "missing"), None);
        assert_eq!(first_param(&[], "token"), None);
    }
}
