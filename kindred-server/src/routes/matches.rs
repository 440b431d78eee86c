use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use kindred_core::matching::{DiscoverPage, LikeResult, MatchSummary};
use kindred_shared::{AppResult, AuthUser};

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub limit: Option<i64>,
}

pub async fn discover(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<DiscoverQuery>,
) -> AppResult<Json<DiscoverPage>> {
    Ok(Json(state.matching.discover(user.id, query.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub target_user_id: i64,
}

pub async fn like(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<TargetRequest>,
) -> AppResult<(StatusCode, Json<LikeResult>)> {
    let result = state.matching.like(user.id, body.target_user_id).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn pass(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<TargetRequest>,
) -> AppResult<StatusCode> {
    state.matching.pass(user.id, body.target_user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct MatchList {
    pub matches: Vec<MatchSummary>,
}

pub async fn list_matches(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<MatchList>> {
    let matches = state.matching.list_matches(user.id).await?;
    Ok(Json(MatchList { matches }))
}

pub async fn unmatch(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(match_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.matching.unmatch(user.id, match_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
