use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unordered pair key: smaller id first.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone, Serialize)]
pub struct Like {
    pub from_user: i64,
    pub to_user: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub id: i64,
    pub user_a: i64,
    pub user_b: i64,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn involves(&self, user_id: i64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The counterparty of `user_id`. Only meaningful for members.
    pub fn other(&self, user_id: i64) -> i64 {
        if self.user_a == user_id { self.user_b } else { self.user_a }
    }
}

#[derive(Debug, Clone)]
pub enum LikeOutcome {
    Liked,
    Matched(Match),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    InappropriateBehavior,
    Harassment,
    Spam,
    NotInterested,
    FakeProfile,
    Other,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::InappropriateBehavior => "inappropriate_behavior",
            BlockReason::Harassment => "harassment",
            BlockReason::Spam => "spam",
            BlockReason::NotInterested => "not_interested",
            BlockReason::FakeProfile => "fake_profile",
            BlockReason::Other => "other",
        }
    }
}

impl std::str::FromStr for BlockReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inappropriate_behavior" => Ok(BlockReason::InappropriateBehavior),
            "harassment" => Ok(BlockReason::Harassment),
            "spam" => Ok(BlockReason::Spam),
            "not_interested" => Ok(BlockReason::NotInterested),
            "fake_profile" => Ok(BlockReason::FakeProfile),
            "other" => Ok(BlockReason::Other),
            _ => Err(format!("unknown block reason: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub id: i64,
    pub blocker_id: i64,
    pub blocked_id: i64,
    pub reason: BlockReason,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBlock {
    pub blocker_id: i64,
    pub blocked_id: i64,
    pub reason: BlockReason,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
