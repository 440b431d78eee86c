//! User-facing reports and blocks.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use kindred_core::models::{Block, Report};
use kindred_core::moderation::{CreateBlock, CreateReport};
use kindred_shared::{AppResult, AuthUser};

use crate::extract::{ApiJson, ApiPath};
use crate::AppState;

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateReport>,
) -> AppResult<(StatusCode, Json<Report>)> {
    let report = state.moderation.create_report(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[derive(Debug, Serialize)]
pub struct ReportList {
    pub reports: Vec<Report>,
}

pub async fn my_reports(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<ReportList>> {
    let reports = state.moderation.my_reports(user.id).await?;
    Ok(Json(ReportList { reports }))
}

pub async fn create_block(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateBlock>,
) -> AppResult<(StatusCode, Json<Block>)> {
    let block = state.moderation.create_block(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(block)))
}

#[derive(Debug, Serialize)]
pub struct BlockList {
    pub blocks: Vec<Block>,
}

pub async fn list_blocks(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<BlockList>> {
    let blocks = state.moderation.list_blocks(user.id).await?;
    Ok(Json(BlockList { blocks }))
}

pub async fn remove_block(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(block_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.moderation.remove_block(user.id, block_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
