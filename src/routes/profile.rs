use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::db::models::{Profile, ProfileUpdate};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/profile", get(get_profile).put(update_profile))
}

/// Absent text fields are left untouched, `null` clears them, strings
/// (empty ones included) overwrite them.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
    pub age: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub gender: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub address: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub website: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// GET /api/profile: whitelisted fields only. `null` if the account behind
/// the session no longer exists.
async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Option<Profile>>> {
    Ok(Json(state.users.profile(&user.id).await?))
}

/// PUT /api/profile
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> AppResult<Json<Value>> {
    let update = ProfileUpdate {
        first_name: req.first_name,
        last_name: req.last_name,
        age: parse_age(req.age.as_ref())?,
        gender: req.gender,
        address: req.address,
        website: req.website,
    };

    if !state.users.update_profile(&user.id, &update).await? {
        return Err(AppError::Internal(format!(
            "profile update for missing user {}",
            user.id
        )));
    }

    tracing::info!("User {} updated their profile", user.username);
    Ok(Json(json!({ "message": "Profile updated successfully!" })))
}

/// Falsy input (absent, `null`, `""`, `0`, `false`) clears the age. Strings
/// use their leading integer; any other number is truncated, so `0.5` is `0`.
pub fn parse_age(age: Option<&Value>) -> AppResult<Option<i64>> {
    let invalid = || AppError::BadRequest("Age must be a number".into());

    match age {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => leading_integer(s).map(Some).ok_or_else(invalid),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(None),
            Some(i) => Ok(Some(i)),
            None => match n.as_f64() {
                Some(f) if f == 0.0 => Ok(None),
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Some(f.trunc() as i64)),
                _ => Err(invalid()),
            },
        },
        Some(_) => Err(invalid()),
    }
}

/// Optional sign followed by at least one digit, after leading whitespace.
/// Anything after the digits is ignored.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => ("-", &s[1..]),
        Some(b'+') => ("", &s[1..]),
        _ => ("", s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    format!("{sign}{digits}").parse().ok()
}
