use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vr_core::models::{Analysis, Badge, ProfileUpdate, User, UserSettings};

use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody, QueryParams};
use crate::state::AppState;

/// What other users may see; no email or settings.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub uid: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub karma: i64,
    pub total_analyses: i64,
    pub accuracy_rate: f64,
    pub community_votes: i64,
    pub badges: Vec<Badge>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            uid: user.uid,
            display_name: user.display_name,
            photo_url: user.photo_url,
            created_at: user.created_at,
            karma: user.karma,
            total_analyses: user.total_analyses,
            accuracy_rate: user.accuracy_rate,
            community_votes: user.community_votes,
            badges: user.badges,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

pub async fn me(State(state): State<AppState>, CurrentUser(uid): CurrentUser) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.profile(&uid).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users.update_profile(&uid, update).await?))
}

pub async fn delete_me(State(state): State<AppState>, CurrentUser(uid): CurrentUser) -> Result<StatusCode, ApiError> {
    state.users.delete_account(&uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn settings(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.users.settings(&uid).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
    JsonBody(settings): JsonBody<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.users.update_settings(&uid, settings).await?))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    Ok(Json(state.users.profile(&uid).await?.into()))
}

pub async fn analyses(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    QueryParams(params): QueryParams<LimitParams>,
) -> Result<Json<Vec<Analysis>>, ApiError> {
    let limit = state.limits.user_analyses(params.limit) as i64;
    Ok(Json(state.analyses.user_analyses(&uid, limit).await?))
}
