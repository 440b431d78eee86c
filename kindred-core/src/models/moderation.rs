use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    InappropriateBehavior,
    Harassment,
    Spam,
    FakeProfile,
    Underage,
    ViolenceThreat,
    InappropriateContent,
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::InappropriateBehavior => "inappropriate_behavior",
            ReportCategory::Harassment => "harassment",
            ReportCategory::Spam => "spam",
            ReportCategory::FakeProfile => "fake_profile",
            ReportCategory::Underage => "underage",
            ReportCategory::ViolenceThreat => "violence_threat",
            ReportCategory::InappropriateContent => "inappropriate_content",
            ReportCategory::Other => "other",
        }
    }

    /// Review queue weight; higher is reviewed first.
    pub fn priority(&self) -> i32 {
        match self {
            ReportCategory::Underage => 100,
            ReportCategory::ViolenceThreat => 90,
            ReportCategory::Harassment => 70,
            ReportCategory::InappropriateContent => 60,
            ReportCategory::InappropriateBehavior => 50,
            ReportCategory::FakeProfile => 40,
            ReportCategory::Spam => 20,
            ReportCategory::Other => 10,
        }
    }
}

impl std::str::FromStr for ReportCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inappropriate_behavior" => Ok(ReportCategory::InappropriateBehavior),
            "harassment" => Ok(ReportCategory::Harassment),
            "spam" => Ok(ReportCategory::Spam),
            "fake_profile" => Ok(ReportCategory::FakeProfile),
            "underage" => Ok(ReportCategory::Underage),
            "violence_threat" => Ok(ReportCategory::ViolenceThreat),
            "inappropriate_content" => Ok(ReportCategory::InappropriateContent),
            "other" => Ok(ReportCategory::Other),
            _ => Err(format!("unknown report category: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
    NeedsMoreInfo,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
            ReportStatus::NeedsMoreInfo => "needs_more_info",
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::NeedsMoreInfo)
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "approved" => Ok(ReportStatus::Approved),
            "rejected" => Ok(ReportStatus::Rejected),
            "needs_more_info" => Ok(ReportStatus::NeedsMoreInfo),
            _ => Err(format!("unknown report status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sanction {
    None,
    Warning,
    TemporaryBan,
    PermanentBan,
}

impl Sanction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sanction::None => "none",
            Sanction::Warning => "warning",
            Sanction::TemporaryBan => "temporary_ban",
            Sanction::PermanentBan => "permanent_ban",
        }
    }

    pub fn is_ban(&self) -> bool {
        matches!(self, Sanction::TemporaryBan | Sanction::PermanentBan)
    }
}

impl std::str::FromStr for Sanction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Sanction::None),
            "warning" => Ok(Sanction::Warning),
            "temporary_ban" => Ok(Sanction::TemporaryBan),
            "permanent_ban" => Ok(Sanction::PermanentBan),
            _ => Err(format!("unknown sanction: {s}")),
        }
    }
}

/// Admin decision on a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approved,
    Rejected,
    NeedsMoreInfo,
}

impl From<ReviewAction> for ReportStatus {
    fn from(action: ReviewAction) -> Self {
        match action {
            ReviewAction::Approved => ReportStatus::Approved,
            ReviewAction::Rejected => ReportStatus::Rejected,
            ReviewAction::NeedsMoreInfo => ReportStatus::NeedsMoreInfo,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub reported_id: i64,
    pub category: ReportCategory,
    pub reason: String,
    pub description: String,
    pub evidence: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub sanction: Option<Sanction>,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: i64,
    pub reported_id: i64,
    pub category: ReportCategory,
    pub reason: String,
    pub description: String,
    pub evidence: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub report_id: i64,
    pub reviewer_id: i64,
    pub action: ReviewAction,
    pub notes: Option<String>,
    pub sanction: Sanction,
    /// Reactivation time for a temporary ban.
    pub reactivate_at: Option<DateTime<Utc>>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SanctionCounts {
    pub warning: u64,
    pub temporary_ban: u64,
    pub permanent_ban: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportStats {
    pub total_filed: u64,
    pub total_received: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub needs_more_info: u64,
    pub sanctions: SanctionCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportHistory {
    pub user_id: i64,
    pub reports_filed: Vec<Report>,
    pub reports_received: Vec<Report>,
    pub stats: ReportStats,
}

impl ReportHistory {
    /// Splits `reports` by the role `user_id` plays and tallies outcomes of
    /// the reports received.
    pub fn build(user_id: i64, reports: Vec<Report>) -> Self {
        let (reports_filed, reports_received): (Vec<_>, Vec<_>) =
            reports.into_iter().partition(|r| r.reporter_id == user_id);

        let mut stats = ReportStats {
            total_filed: reports_filed.len() as u64,
            total_received: reports_received.len() as u64,
            ..Default::default()
        };
        for report in &reports_received {
            match report.status {
                ReportStatus::Pending => stats.pending += 1,
                ReportStatus::Approved => stats.approved += 1,
                ReportStatus::Rejected => stats.rejected += 1,
                ReportStatus::NeedsMoreInfo => stats.needs_more_info += 1,
            }
            match report.sanction {
                Some(Sanction::Warning) => stats.sanctions.warning += 1,
                Some(Sanction::TemporaryBan) => stats.sanctions.temporary_ban += 1,
                Some(Sanction::PermanentBan) => stats.sanctions.permanent_ban += 1,
                Some(Sanction::None) | None => {}
            }
        }

        Self {
            user_id,
            reports_filed,
            reports_received,
            stats,
        }
    }
}
