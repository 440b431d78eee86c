use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use kindred_core::models::{Report, ReportHistory, ReportStatus};
use kindred_core::moderation::{ReportPage, ReviewInput};
use kindred_shared::middleware::AdminUser;
use kindred_shared::{AppResult, PaginationParams};

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Review queue, highest priority first.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> AppResult<Json<ReportPage>> {
    let paging = PaginationParams::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    Ok(Json(state.moderation.list_reports(query.status, &paging).await?))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(report_id): ApiPath<i64>,
) -> AppResult<Json<Report>> {
    Ok(Json(state.moderation.get_report(report_id).await?))
}

pub async fn review_report(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiPath(report_id): ApiPath<i64>,
    ApiJson(body): ApiJson<ReviewInput>,
) -> AppResult<Json<Report>> {
    Ok(Json(state.moderation.review(admin.id, report_id, body).await?))
}

pub async fn user_reports(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(user_id): ApiPath<i64>,
) -> AppResult<Json<ReportHistory>> {
    Ok(Json(state.moderation.user_report_history(user_id).await?))
}
