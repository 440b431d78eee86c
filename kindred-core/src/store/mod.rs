//! Persistence seams.
//!
//! Every method that must read and write atomically (like-to-match promotion,
//! message append under the block gate, duplicate report guard, review with
//! sanction) is a single store call so each backend can run it in one
//! transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use kindred_shared::AppResult;

use crate::models::{
    Block, ChatRow, CursorAdvance, Interest, LikeOutcome, Match, Message, NewBlock, NewMessage,
    NewPhoto, NewReport, NewUser, Photo, ProfilePatch, Report, ReportFilter, ReviewDecision, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Runs while the appended message's row is still locked, so observers see
/// messages of one match in id order.
pub type PersistHook = Arc<dyn Fn(&Message) + Send + Sync>;

/// Latitude/longitude window used to prefilter candidates before the exact
/// great-circle check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    /// `None` when the window wraps the antimeridian or covers a pole.
    pub lon: Option<(f64, f64)>,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        match self.lon {
            Some((min, max)) => lon >= min && lon <= max,
            None => true,
        }
    }
}

/// Coarse candidate query; the matching engine applies exact checks on top.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    /// Inclusive birth date bounds derived from the viewer's age range.
    pub born_from: NaiveDate,
    pub born_to: NaiveDate,
    pub bounds: Option<BoundingBox>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fails with `EmailAlreadyExists` on a taken email.
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_users(&self, ids: &[i64]) -> AppResult<Vec<User>>;
    async fn update_profile(&self, id: i64, patch: &ProfilePatch, now: DateTime<Utc>) -> AppResult<User>;
    async fn set_role(&self, id: i64, role: kindred_shared::UserRole) -> AppResult<()>;

    /// Photos per user, each list in upload order.
    async fn photos_for(&self, user_ids: &[i64]) -> AppResult<HashMap<i64, Vec<Photo>>>;
    /// Inserts a photo, keeping exactly one primary per user. Fails with
    /// `PhotoLimitReached` when the user already has `max_photos`.
    async fn add_photo(&self, photo: NewPhoto, max_photos: usize) -> AppResult<Photo>;
    async fn find_photo(&self, id: i64) -> AppResult<Option<Photo>>;
    /// Deleting the primary photo promotes the owner's oldest remaining one.
    async fn delete_photo(&self, id: i64) -> AppResult<()>;
    /// Makes `id` the owner's only primary photo. Fails with `PhotoNotFound`.
    async fn set_primary_photo(&self, id: i64) -> AppResult<Photo>;

    /// Active catalog entries, by id.
    async fn interests(&self) -> AppResult<Vec<Interest>>;

    async fn reactivate_user(&self, id: i64, now: DateTime<Utc>) -> AppResult<()>;
    /// Reactivates every user whose temporary ban ended at or before `now`.
    async fn reactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<i64>>;

    async fn store_refresh_token(&self, user_id: i64, token_hash: &str, expires_at: DateTime<Utc>) -> AppResult<()>;
    /// Single use: a consumed token is deleted.
    async fn consume_refresh_token(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<i64>>;

    async fn ping(&self) -> AppResult<()>;
}

#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Active users other than `viewer` within the filter, excluding anyone
    /// the viewer liked or passed, matched with, or shares a block with.
    async fn candidate_pool(&self, viewer: i64, filter: &CandidateFilter) -> AppResult<Vec<User>>;

    async fn record_like(&self, from: i64, to: i64, now: DateTime<Utc>) -> AppResult<LikeOutcome>;
    async fn record_pass(&self, from: i64, to: i64, now: DateTime<Utc>) -> AppResult<()>;

    /// Ended matches are not returned by `find_match`, `matches_for` or
    /// `chat_rows`, and refuse new messages.
    async fn find_match(&self, id: i64) -> AppResult<Option<Match>>;
    async fn matches_for(&self, user_id: i64) -> AppResult<Vec<Match>>;
    /// Ends a live match. Fails with `MatchNotFound` when it is unknown or
    /// already ended and `NotMatchMember` for outsiders. The pair stays out
    /// of each other's discovery.
    async fn end_match(&self, match_id: i64, user_id: i64, now: DateTime<Utc>) -> AppResult<Match>;

    /// Users sharing a block with `user_id`, either direction.
    async fn blocked_peers(&self, user_id: i64) -> AppResult<HashSet<i64>>;
    /// Returns the existing block when the pair is already blocked.
    async fn create_block(&self, block: NewBlock) -> AppResult<Block>;
    async fn list_blocks(&self, blocker_id: i64) -> AppResult<Vec<Block>>;
    async fn find_block(&self, id: i64) -> AppResult<Option<Block>>;
    async fn delete_block(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends under the match lock after checking membership, activity, and
    /// blocks. `on_persist` runs before the lock is released.
    async fn append_message(
        &self,
        message: NewMessage,
        now: DateTime<Utc>,
        on_persist: PersistHook,
    ) -> AppResult<Message>;

    /// Newest first, ids strictly below `before` when given.
    async fn list_messages(&self, match_id: i64, before: Option<i64>, limit: i64) -> AppResult<Vec<Message>>;

    async fn chat_rows(&self, user_id: i64) -> AppResult<Vec<ChatRow>>;

    /// Moves the cursor to `max(current, min(up_to, newest id))`; `None`
    /// reads up to the newest message.
    async fn advance_read_cursor(&self, match_id: i64, user_id: i64, up_to: Option<i64>) -> AppResult<CursorAdvance>;
}

#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Fails with `DuplicateReport` while an unresolved report for the same
    /// pair exists.
    async fn create_report(&self, report: NewReport) -> AppResult<Report>;
    async fn reports_by_reporter(&self, reporter_id: i64) -> AppResult<Vec<Report>>;
    /// Highest category priority first, then oldest first.
    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<(Vec<Report>, u64)>;
    async fn find_report(&self, id: i64) -> AppResult<Option<Report>>;
    /// Updates the report and applies the sanction to the reported user.
    async fn review_report(&self, decision: ReviewDecision) -> AppResult<Report>;
    async fn reports_involving(&self, user_id: i64) -> AppResult<Vec<Report>>;
}

pub trait Store: IdentityStore + RelationStore + ConversationStore + ModerationStore {}

impl<T> Store for T where T: IdentityStore + RelationStore + ConversationStore + ModerationStore {}
