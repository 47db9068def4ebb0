use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use vr_core::models::{TallyUpdate, UserVote, VoteDirection, VoteOutcome};
use vr_core::voting::VoteIntent;

use crate::error::ApiError;
use crate::extract::{AnalysisId, CurrentUser, JsonBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub vote: VoteDirection,
}

pub async fn current(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
    AnalysisId(id): AnalysisId,
) -> Result<Json<Option<UserVote>>, ApiError> {
    Ok(Json(state.votes.current_vote(&uid, id).await?))
}

/// Same direction twice retracts; the other direction switches.
pub async fn cast(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
    AnalysisId(id): AnalysisId,
    JsonBody(body): JsonBody<VoteBody>,
) -> Result<Json<VoteOutcome>, ApiError> {
    apply(&state, &uid, id, VoteIntent::Toggle(body.vote)).await
}

pub async fn clear(
    State(state): State<AppState>,
    CurrentUser(uid): CurrentUser,
    AnalysisId(id): AnalysisId,
) -> Result<Json<VoteOutcome>, ApiError> {
    apply(&state, &uid, id, VoteIntent::Clear).await
}

async fn apply(
    state: &AppState,
    uid: &str,
    id: uuid::Uuid,
    intent: VoteIntent,
) -> Result<Json<VoteOutcome>, ApiError> {
    let outcome = state.votes.vote(uid, id, intent).await?;
    if outcome.previous != outcome.vote {
        state
            .metrics
            .vote_recorded(outcome.vote.map_or("none", |v| v.as_str()));
    }
    Ok(Json(outcome))
}

pub async fn recount(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    AnalysisId(id): AnalysisId,
) -> Result<Json<TallyUpdate>, ApiError> {
    let community_votes = state.votes.recount(id).await?;
    state.metrics.recounted();
    Ok(Json(TallyUpdate { analysis_id: id, community_votes }))
}
