use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;

use kindred_shared::{AppError, AppResult, ErrorCode};

use super::rows::{NewReportRow, ReportRow};
use super::schema::{reports, users};
use super::{lock_pair, PgStore, LOCK_REPORT};
use crate::models::{NewReport, Report, ReportFilter, ReportStatus, ReviewDecision, Sanction};
use crate::store::ModerationStore;

const UNRESOLVED: [&str; 2] = ["pending", "needs_more_info"];

fn into_reports(rows: Vec<ReportRow>) -> AppResult<Vec<Report>> {
    rows.into_iter().map(ReportRow::into_domain).collect()
}

#[async_trait]
impl ModerationStore for PgStore {
    async fn create_report(&self, report: NewReport) -> AppResult<Report> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let known: bool = diesel::select(exists(users::table.find(report.reported_id))).get_result(conn)?;
                if !known {
                    return Err(AppError::new(ErrorCode::TargetNotFound, "reported user does not exist"));
                }

                lock_pair(conn, LOCK_REPORT, report.reporter_id, report.reported_id)?;
                let duplicate: bool = diesel::select(exists(
                    reports::table
                        .filter(reports::reporter_id.eq(report.reporter_id))
                        .filter(reports::reported_id.eq(report.reported_id))
                        .filter(reports::status.eq_any(UNRESOLVED)),
                ))
                .get_result(conn)?;
                if duplicate {
                    return Err(AppError::new(
                        ErrorCode::DuplicateReport,
                        "you already have an open report against this user",
                    ));
                }

                diesel::insert_into(reports::table)
                    .values(NewReportRow::from(&report))
                    .get_result::<ReportRow>(conn)?
                    .into_domain()
            })
        })
        .await
    }

    async fn reports_by_reporter(&self, reporter_id: i64) -> AppResult<Vec<Report>> {
        self.run(move |conn| {
            let rows = reports::table
                .filter(reports::reporter_id.eq(reporter_id))
                .order((reports::created_at.desc(), reports::id.desc()))
                .load::<ReportRow>(conn)?;
            into_reports(rows)
        })
        .await
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<(Vec<Report>, u64)> {
        let filter = filter.clone();
        self.run(move |conn| {
            let status = filter.status.map(|s| s.as_str());

            let mut count_query = reports::table.count().into_boxed();
            let mut page_query = reports::table.into_boxed();
            if let Some(status) = status {
                count_query = count_query.filter(reports::status.eq(status));
                page_query = page_query.filter(reports::status.eq(status));
            }

            let total: i64 = count_query.get_result(conn)?;
            let rows = page_query
                .order((reports::priority.desc(), reports::created_at.asc(), reports::id.asc()))
                .offset(filter.offset)
                .limit(filter.limit)
                .load::<ReportRow>(conn)?;
            Ok((into_reports(rows)?, total as u64))
        })
        .await
    }

    async fn find_report(&self, id: i64) -> AppResult<Option<Report>> {
        self.run(move |conn| {
            reports::table
                .find(id)
                .first::<ReportRow>(conn)
                .optional()?
                .map(ReportRow::into_domain)
                .transpose()
        })
        .await
    }

    async fn review_report(&self, decision: ReviewDecision) -> AppResult<Report> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let current = reports::table
                    .find(decision.report_id)
                    .for_update()
                    .first::<ReportRow>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))?
                    .into_domain()?;
                if !current.status.is_unresolved() {
                    return Err(AppError::new(
                        ErrorCode::ReportAlreadyReviewed,
                        "this report has already been reviewed",
                    ));
                }

                let status: ReportStatus = decision.action.into();
                let updated = diesel::update(reports::table.find(decision.report_id))
                    .set((
                        reports::status.eq(status.as_str()),
                        reports::reviewer_id.eq(Some(decision.reviewer_id)),
                        reports::reviewed_at.eq(Some(decision.reviewed_at)),
                        reports::review_notes.eq(decision.notes.as_deref()),
                        reports::sanction.eq(Some(decision.sanction.as_str())),
                    ))
                    .get_result::<ReportRow>(conn)?
                    .into_domain()?;

                if decision.sanction.is_ban() {
                    let reactivate_at: Option<DateTime<Utc>> = match decision.sanction {
                        Sanction::TemporaryBan => decision.reactivate_at,
                        _ => None,
                    };
                    diesel::update(users::table.find(current.reported_id))
                        .set((
                            users::is_active.eq(false),
                            users::reactivate_at.eq(reactivate_at),
                            users::updated_at.eq(decision.reviewed_at),
                        ))
                        .execute(conn)?;
                }

                Ok(updated)
            })
        })
        .await
    }

    async fn reports_involving(&self, user_id: i64) -> AppResult<Vec<Report>> {
        self.run(move |conn| {
            let rows = reports::table
                .filter(reports::reporter_id.eq(user_id).or(reports::reported_id.eq(user_id)))
                .order((reports::created_at.desc(), reports::id.desc()))
                .load::<ReportRow>(conn)?;
            into_reports(rows)
        })
        .await
    }
}
