//! Reports, blocks and the admin review queue.
//!
//! A sanction is written in the same store call that resolves the report.
//! Side effects on live sessions (warning delivery, ban disconnect) follow
//! once that call has committed.

use std::sync::Arc;

use chrono::Duration;
use metrics::counter;
use serde::{Deserialize, Serialize};

use kindred_shared::types::pagination::PaginationParams;
use kindred_shared::{AppError, AppResult, ErrorCode};

use crate::clock::Clock;
use crate::hub::{HubEvent, PushHub, WarningPayload};
use crate::models::{
    Block, BlockReason, NewBlock, NewReport, Report, ReportCategory, ReportFilter, ReportHistory,
    ReportStatus, ReviewAction, ReviewDecision, Sanction,
};
use crate::store::Store;

pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const MAX_NOTES_CHARS: usize = 500;
pub const DEFAULT_TEMP_BAN_DAYS: i64 = 7;
pub const MAX_TEMP_BAN_DAYS: i64 = 365;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReport {
    pub reported_user_id: i64,
    pub category: ReportCategory,
    #[serde(default)]
    pub reason: String,
    pub description: String,
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlock {
    pub blocked_user_id: i64,
    pub reason: BlockReason,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub action: ReviewAction,
    #[serde(default, alias = "notes")]
    pub review_notes: Option<String>,
    #[serde(default, alias = "punishment")]
    pub sanction: Option<Sanction>,
    #[serde(default)]
    pub ban_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

pub struct ModerationService {
    store: Arc<dyn Store>,
    hub: Arc<PushHub>,
    clock: Arc<dyn Clock>,
    default_ban_days: i64,
}

impl ModerationService {
    pub fn new(store: Arc<dyn Store>, hub: Arc<PushHub>, clock: Arc<dyn Clock>, default_ban_days: i64) -> Self {
        Self {
            store,
            hub,
            clock,
            default_ban_days,
        }
    }

    pub async fn create_report(&self, reporter_id: i64, input: CreateReport) -> AppResult<Report> {
        if input.reported_user_id == reporter_id {
            return Err(AppError::new(ErrorCode::CannotReportSelf, "you cannot report yourself"));
        }
        let description = input.description.trim().to_string();
        let length = description.chars().count();
        if !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&length) {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("description must be {MIN_DESCRIPTION_CHARS} to {MAX_DESCRIPTION_CHARS} characters"),
            ));
        }

        let report = self
            .store
            .create_report(NewReport {
                reporter_id,
                reported_id: input.reported_user_id,
                category: input.category,
                reason: input.reason.trim().to_string(),
                description,
                evidence: input.evidence.filter(|e| !e.trim().is_empty()),
                created_at: self.clock.now(),
            })
            .await?;

        counter!("reports_total", "category" => report.category.as_str()).increment(1);
        tracing::info!(
            report_id = report.id,
            reporter_id,
            reported_id = report.reported_id,
            category = report.category.as_str(),
            "report filed"
        );
        Ok(report)
    }

    pub async fn my_reports(&self, reporter_id: i64) -> AppResult<Vec<Report>> {
        self.store.reports_by_reporter(reporter_id).await
    }

    /// Returns the existing block when the pair is already blocked.
    pub async fn create_block(&self, blocker_id: i64, input: CreateBlock) -> AppResult<Block> {
        if input.blocked_user_id == blocker_id {
            return Err(AppError::new(ErrorCode::CannotBlockSelf, "you cannot block yourself"));
        }
        let notes = input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("notes must be at most {MAX_NOTES_CHARS} characters"),
            ));
        }

        let block = self
            .store
            .create_block(NewBlock {
                blocker_id,
                blocked_id: input.blocked_user_id,
                reason: input.reason,
                notes,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(block_id = block.id, blocker_id, blocked_id = block.blocked_id, "user blocked");
        Ok(block)
    }

    pub async fn list_blocks(&self, blocker_id: i64) -> AppResult<Vec<Block>> {
        self.store.list_blocks(blocker_id).await
    }

    /// Deleting an absent block succeeds.
    pub async fn remove_block(&self, blocker_id: i64, block_id: i64) -> AppResult<()> {
        let Some(block) = self.store.find_block(block_id).await? else {
            return Ok(());
        };
        if block.blocker_id != blocker_id {
            return Err(AppError::new(ErrorCode::NotBlockOwner, "you can only remove your own blocks"));
        }
        self.store.delete_block(block_id).await?;
        tracing::info!(block_id, blocker_id, blocked_id = block.blocked_id, "block removed");
        Ok(())
    }

    pub async fn list_reports(&self, status: Option<ReportStatus>, paging: &PaginationParams) -> AppResult<ReportPage> {
        let filter = ReportFilter {
            status,
            offset: paging.offset() as i64,
            limit: paging.limit() as i64,
        };
        let (reports, total) = self.store.list_reports(&filter).await?;
        Ok(ReportPage {
            reports,
            total,
            page: paging.page.max(1),
            per_page: paging.limit(),
        })
    }

    pub async fn get_report(&self, report_id: i64) -> AppResult<Report> {
        self.store
            .find_report(report_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))
    }

    pub async fn review(&self, reviewer_id: i64, report_id: i64, input: ReviewInput) -> AppResult<Report> {
        let sanction = input.sanction.unwrap_or(Sanction::None);
        if sanction != Sanction::None && input.action != ReviewAction::Approved {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "a sanction can only accompany an approved report",
            ));
        }
        let notes = input.review_notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_DESCRIPTION_CHARS) {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("review notes must be at most {MAX_DESCRIPTION_CHARS} characters"),
            ));
        }

        let now = self.clock.now();
        let reactivate_at = match sanction {
            Sanction::TemporaryBan => {
                let days = input.ban_days.unwrap_or(self.default_ban_days);
                if !(1..=MAX_TEMP_BAN_DAYS).contains(&days) {
                    return Err(AppError::new(
                        ErrorCode::ValidationError,
                        format!("ban_days must be between 1 and {MAX_TEMP_BAN_DAYS}"),
                    ));
                }
                Some(now + Duration::days(days))
            }
            _ => None,
        };

        let report = self
            .store
            .review_report(ReviewDecision {
                report_id,
                reviewer_id,
                action: input.action,
                notes,
                sanction,
                reactivate_at,
                reviewed_at: now,
            })
            .await?;

        tracing::info!(
            report_id,
            reviewer_id,
            reported_id = report.reported_id,
            status = report.status.as_str(),
            sanction = sanction.as_str(),
            "report reviewed"
        );
        self.apply_sanction(&report, sanction);
        Ok(report)
    }

    fn apply_sanction(&self, report: &Report, sanction: Sanction) {
        if sanction == Sanction::None {
            return;
        }
        counter!("sanctions_total", "sanction" => sanction.as_str()).increment(1);
        match sanction {
            Sanction::Warning => {
                let delivered = self.hub.publish(
                    &[report.reported_id],
                    HubEvent::AccountWarning(WarningPayload {
                        report_id: report.id,
                        message: format!(
                            "your account received a warning for {}",
                            report.category.as_str().replace('_', " ")
                        ),
                    }),
                );
                tracing::info!(report_id = report.id, user_id = report.reported_id, delivered, "warning issued");
            }
            Sanction::TemporaryBan | Sanction::PermanentBan => {
                let closed = self.hub.disconnect_user(report.reported_id);
                tracing::info!(
                    report_id = report.id,
                    user_id = report.reported_id,
                    sanction = sanction.as_str(),
                    sessions_closed = closed,
                    "user banned"
                );
            }
            Sanction::None => {}
        }
    }

    pub async fn user_report_history(&self, user_id: i64) -> AppResult<ReportHistory> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::new(ErrorCode::ProfileNotFound, "user not found"));
        }
        let mut reports = self.store.reports_involving(user_id).await?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(ReportHistory::build(user_id, reports))
    }

    /// Lifts every temporary ban that has run out.
    pub async fn reactivate_expired(&self) -> AppResult<Vec<i64>> {
        let ids = self.store.reactivate_expired(self.clock.now()).await?;
        for user_id in &ids {
            tracing::info!(user_id, "temporary ban elapsed, account reactivated");
        }
        Ok(ids)
    }
}
