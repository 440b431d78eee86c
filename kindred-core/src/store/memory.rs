use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use kindred_shared::{AppError, AppResult, ErrorCode, UserRole};

use super::{
    CandidateFilter, ConversationStore, IdentityStore, ModerationStore, PersistHook,
    RelationStore,
};
use crate::models::{
    canonical_pair, default_interests, Block, ChatRow, CursorAdvance, Interest, Like, LikeOutcome,
    Match, Message, NewBlock, NewMessage, NewPhoto, NewReport, NewUser, Photo, ProfilePatch,
    Report, ReportFilter, ReviewDecision, Sanction, User, DEFAULT_AGE_RANGE_MAX,
    DEFAULT_AGE_RANGE_MIN, DEFAULT_MAX_DISTANCE_KM,
};

/// One id sequence per table, like the `BIGSERIAL` columns.
#[derive(Default)]
struct Sequences {
    users: i64,
    photos: i64,
    matches: i64,
    blocks: i64,
    messages: i64,
    reports: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Default)]
struct Tables {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    photos: BTreeMap<i64, Photo>,
    likes: HashMap<(i64, i64), Like>,
    passes: HashSet<(i64, i64)>,
    matches: BTreeMap<i64, Match>,
    ended_matches: HashSet<i64>,
    match_by_pair: HashMap<(i64, i64), i64>,
    blocks: BTreeMap<i64, Block>,
    messages: BTreeMap<i64, Message>,
    cursors: HashMap<(i64, i64), i64>,
    reports: BTreeMap<i64, Report>,
    refresh_tokens: HashMap<String, (i64, DateTime<Utc>)>,
    interests: Vec<Interest>,
}

impl Tables {
    fn live_match(&self, id: i64) -> Option<&Match> {
        self.matches.get(&id).filter(|m| !self.ended_matches.contains(&m.id))
    }

    fn blocked_between(&self, a: i64, b: i64) -> bool {
        self.blocks
            .values()
            .any(|bl| (bl.blocker_id == a && bl.blocked_id == b) || (bl.blocker_id == b && bl.blocked_id == a))
    }

    fn user(&self, id: i64) -> AppResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))
    }

    fn match_messages(&self, match_id: i64) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages.values().filter(move |m| m.match_id == match_id)
    }
}

/// Single-process store. One mutex guards every table, so each method is
/// serializable with respect to all others.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Empty store with the seed interest catalog.
    pub fn new() -> Self {
        let tables = Tables {
            interests: default_interests(),
            ..Tables::default()
        };
        Self {
            tables: Mutex::new(tables),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }
        let id = next(&mut t.seq.users);
        let record = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            birth_date: user.birth_date,
            gender: user.gender,
            bio: String::new(),
            location: None,
            is_active: true,
            role: user.role,
            show_age: true,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            age_range_min: DEFAULT_AGE_RANGE_MIN,
            age_range_max: DEFAULT_AGE_RANGE_MAX,
            interests: Vec::new(),
            reactivate_at: None,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        t.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.tables.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[i64]) -> AppResult<Vec<User>> {
        let t = self.tables.lock();
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn update_profile(&self, id: i64, patch: &ProfilePatch, now: DateTime<Utc>) -> AppResult<User> {
        let mut t = self.tables.lock();
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?;
        if !patch.is_empty() {
            patch.apply_to(user);
            user.updated_at = now;
        }
        Ok(user.clone())
    }

    async fn set_role(&self, id: i64, role: UserRole) -> AppResult<()> {
        let mut t = self.tables.lock();
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?;
        user.role = role;
        Ok(())
    }

    async fn photos_for(&self, user_ids: &[i64]) -> AppResult<HashMap<i64, Vec<Photo>>> {
        let t = self.tables.lock();
        let mut out: HashMap<i64, Vec<Photo>> = HashMap::new();
        for photo in t.photos.values().filter(|p| user_ids.contains(&p.user_id)) {
            out.entry(photo.user_id).or_default().push(photo.clone());
        }
        Ok(out)
    }

    async fn add_photo(&self, photo: NewPhoto, max_photos: usize) -> AppResult<Photo> {
        let mut t = self.tables.lock();
        t.user(photo.user_id)?;
        let existing = t.photos.values().filter(|p| p.user_id == photo.user_id).count();
        if existing >= max_photos {
            return Err(AppError::new(
                ErrorCode::PhotoLimitReached,
                format!("a profile can hold at most {max_photos} photos"),
            ));
        }

        let is_primary = photo.is_primary || existing == 0;
        if is_primary {
            for p in t.photos.values_mut().filter(|p| p.user_id == photo.user_id) {
                p.is_primary = false;
            }
        }

        let id = next(&mut t.seq.photos);
        let record = Photo {
            id,
            user_id: photo.user_id,
            url: photo.url,
            is_primary,
            caption: photo.caption,
            created_at: photo.created_at,
        };
        t.photos.insert(id, record.clone());
        Ok(record)
    }

    async fn find_photo(&self, id: i64) -> AppResult<Option<Photo>> {
        Ok(self.tables.lock().photos.get(&id).cloned())
    }

    async fn delete_photo(&self, id: i64) -> AppResult<()> {
        let mut t = self.tables.lock();
        let Some(removed) = t.photos.remove(&id) else {
            return Ok(());
        };
        if removed.is_primary {
            if let Some(oldest) = t.photos.values_mut().find(|p| p.user_id == removed.user_id) {
                oldest.is_primary = true;
            }
        }
        Ok(())
    }

    async fn set_primary_photo(&self, id: i64) -> AppResult<Photo> {
        let mut t = self.tables.lock();
        let owner = t
            .photos
            .get(&id)
            .map(|p| p.user_id)
            .ok_or_else(|| AppError::new(ErrorCode::PhotoNotFound, "photo not found"))?;
        let mut chosen = None;
        for photo in t.photos.values_mut().filter(|p| p.user_id == owner) {
            photo.is_primary = photo.id == id;
            if photo.is_primary {
                chosen = Some(photo.clone());
            }
        }
        chosen.ok_or_else(|| AppError::new(ErrorCode::PhotoNotFound, "photo not found"))
    }

    async fn interests(&self) -> AppResult<Vec<Interest>> {
        Ok(self.tables.lock().interests.clone())
    }

    async fn reactivate_user(&self, id: i64, now: DateTime<Utc>) -> AppResult<()> {
        let mut t = self.tables.lock();
        if let Some(user) = t.users.get_mut(&id) {
            user.is_active = true;
            user.reactivate_at = None;
            user.updated_at = now;
        }
        Ok(())
    }

    async fn reactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<i64>> {
        let mut t = self.tables.lock();
        let mut ids = Vec::new();
        for user in t.users.values_mut() {
            if !user.is_active && user.reactivate_at.is_some_and(|at| at <= now) {
                user.is_active = true;
                user.reactivate_at = None;
                user.updated_at = now;
                ids.push(user.id);
            }
        }
        Ok(ids)
    }

    async fn store_refresh_token(&self, user_id: i64, token_hash: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        self.tables
            .lock()
            .refresh_tokens
            .insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn consume_refresh_token(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<i64>> {
        let mut t = self.tables.lock();
        Ok(match t.refresh_tokens.remove(token_hash) {
            Some((user_id, expires_at)) if expires_at > now => Some(user_id),
            _ => None,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn candidate_pool(&self, viewer: i64, filter: &CandidateFilter) -> AppResult<Vec<User>> {
        let t = self.tables.lock();
        let candidates = t
            .users
            .values()
            .filter(|u| u.id != viewer && u.is_active)
            .filter(|u| u.birth_date >= filter.born_from && u.birth_date <= filter.born_to)
            .filter(|u| match (&filter.bounds, u.location) {
                (Some(bounds), Some(loc)) => bounds.contains(loc.latitude, loc.longitude),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|u| !t.likes.contains_key(&(viewer, u.id)))
            .filter(|u| !t.passes.contains(&(viewer, u.id)))
            .filter(|u| !t.match_by_pair.contains_key(&canonical_pair(viewer, u.id)))
            .filter(|u| !t.blocked_between(viewer, u.id))
            .cloned()
            .collect();
        Ok(candidates)
    }

    async fn record_like(&self, from: i64, to: i64, now: DateTime<Utc>) -> AppResult<LikeOutcome> {
        let mut t = self.tables.lock();
        let target = t
            .users
            .get(&to)
            .ok_or_else(|| AppError::new(ErrorCode::TargetNotFound, "target user does not exist"))?;
        if !target.is_active || t.blocked_between(from, to) {
            return Err(AppError::new(ErrorCode::TargetUnavailable, "target user is unavailable"));
        }
        if t.likes.contains_key(&(from, to)) {
            return Err(AppError::new(ErrorCode::AlreadyLiked, "you already liked this user"));
        }

        t.likes.insert(
            (from, to),
            Like {
                from_user: from,
                to_user: to,
                created_at: now,
            },
        );

        let pair = canonical_pair(from, to);
        if !t.likes.contains_key(&(to, from)) || t.match_by_pair.contains_key(&pair) {
            return Ok(LikeOutcome::Liked);
        }

        let id = next(&mut t.seq.matches);
        let created = Match {
            id,
            user_a: pair.0,
            user_b: pair.1,
            created_at: now,
        };
        t.matches.insert(id, created.clone());
        t.match_by_pair.insert(pair, id);
        Ok(LikeOutcome::Matched(created))
    }

    async fn record_pass(&self, from: i64, to: i64, _now: DateTime<Utc>) -> AppResult<()> {
        let mut t = self.tables.lock();
        if !t.users.contains_key(&to) {
            return Err(AppError::new(ErrorCode::TargetNotFound, "target user does not exist"));
        }
        t.passes.insert((from, to));
        Ok(())
    }

    async fn find_match(&self, id: i64) -> AppResult<Option<Match>> {
        Ok(self.tables.lock().live_match(id).cloned())
    }

    async fn matches_for(&self, user_id: i64) -> AppResult<Vec<Match>> {
        let t = self.tables.lock();
        Ok(t.matches
            .values()
            .filter(|m| m.involves(user_id) && !t.ended_matches.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn end_match(&self, match_id: i64, user_id: i64, _now: DateTime<Utc>) -> AppResult<Match> {
        let mut t = self.tables.lock();
        let ended = t
            .live_match(match_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))?;
        if !ended.involves(user_id) {
            return Err(AppError::new(ErrorCode::NotMatchMember, "you are not part of this match"));
        }
        t.ended_matches.insert(ended.id);
        Ok(ended)
    }

    async fn blocked_peers(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let t = self.tables.lock();
        Ok(t.blocks
            .values()
            .filter_map(|b| {
                if b.blocker_id == user_id {
                    Some(b.blocked_id)
                } else if b.blocked_id == user_id {
                    Some(b.blocker_id)
                } else {
                    None
                }
            })
            .collect())
    }

    async fn create_block(&self, block: NewBlock) -> AppResult<Block> {
        let mut t = self.tables.lock();
        t.user(block.blocked_id)
            .map_err(|_| AppError::new(ErrorCode::TargetNotFound, "user to block does not exist"))?;
        if let Some(existing) = t
            .blocks
            .values()
            .find(|b| b.blocker_id == block.blocker_id && b.blocked_id == block.blocked_id)
        {
            return Ok(existing.clone());
        }
        let id = next(&mut t.seq.blocks);
        let record = Block {
            id,
            blocker_id: block.blocker_id,
            blocked_id: block.blocked_id,
            reason: block.reason,
            notes: block.notes,
            created_at: block.created_at,
        };
        t.blocks.insert(id, record.clone());
        Ok(record)
    }

    async fn list_blocks(&self, blocker_id: i64) -> AppResult<Vec<Block>> {
        let t = self.tables.lock();
        let mut blocks: Vec<Block> = t.blocks.values().filter(|b| b.blocker_id == blocker_id).cloned().collect();
        blocks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(blocks)
    }

    async fn find_block(&self, id: i64) -> AppResult<Option<Block>> {
        Ok(self.tables.lock().blocks.get(&id).cloned())
    }

    async fn delete_block(&self, id: i64) -> AppResult<()> {
        self.tables.lock().blocks.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append_message(
        &self,
        message: NewMessage,
        now: DateTime<Utc>,
        on_persist: PersistHook,
    ) -> AppResult<Message> {
        let mut t = self.tables.lock();
        let chat = t
            .live_match(message.match_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))?;
        if !chat.involves(message.sender_id) {
            return Err(AppError::new(ErrorCode::NotMatchMember, "you are not part of this match"));
        }
        let other = chat.other(message.sender_id);
        if t.blocked_between(message.sender_id, other) {
            return Err(AppError::new(ErrorCode::ChatBlocked, "this conversation is blocked"));
        }
        if !t.user(message.sender_id)?.is_active {
            return Err(AppError::new(ErrorCode::UserBanned, "your account is deactivated"));
        }
        if !t.user(other)?.is_active {
            return Err(AppError::new(ErrorCode::TargetUnavailable, "this user is unavailable"));
        }

        let created_at = match t.match_messages(chat.id).next_back() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        let id = next(&mut t.seq.messages);
        let record = Message {
            id,
            match_id: chat.id,
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            created_at,
        };
        t.messages.insert(id, record.clone());
        on_persist(&record);
        Ok(record)
    }

    async fn list_messages(&self, match_id: i64, before: Option<i64>, limit: i64) -> AppResult<Vec<Message>> {
        let t = self.tables.lock();
        Ok(t.match_messages(match_id)
            .rev()
            .filter(|m| before.map_or(true, |b| m.id < b))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn chat_rows(&self, user_id: i64) -> AppResult<Vec<ChatRow>> {
        let t = self.tables.lock();
        let rows = t
            .matches
            .values()
            .filter(|m| m.involves(user_id) && !t.ended_matches.contains(&m.id))
            .map(|m| {
                let cursor = t.cursors.get(&(m.id, user_id)).copied().unwrap_or(0);
                let unread_count = t
                    .match_messages(m.id)
                    .filter(|msg| msg.id > cursor && msg.sender_id != user_id)
                    .count() as i64;
                ChatRow {
                    chat: m.clone(),
                    last_message: t.match_messages(m.id).next_back().cloned(),
                    unread_count,
                }
            })
            .collect();
        Ok(rows)
    }

    async fn advance_read_cursor(&self, match_id: i64, user_id: i64, up_to: Option<i64>) -> AppResult<CursorAdvance> {
        let mut t = self.tables.lock();
        let newest = t.match_messages(match_id).next_back().map(|m| m.id).unwrap_or(0);
        let target = up_to.map_or(newest, |id| id.min(newest));
        let entry = t.cursors.entry((match_id, user_id)).or_insert(0);
        let previous = *entry;
        *entry = previous.max(target);
        Ok(CursorAdvance {
            previous,
            current: *entry,
        })
    }
}

#[async_trait]
impl ModerationStore for MemoryStore {
    async fn create_report(&self, report: NewReport) -> AppResult<Report> {
        let mut t = self.tables.lock();
        t.user(report.reported_id)
            .map_err(|_| AppError::new(ErrorCode::TargetNotFound, "reported user does not exist"))?;
        let duplicate = t.reports.values().any(|r| {
            r.reporter_id == report.reporter_id && r.reported_id == report.reported_id && r.status.is_unresolved()
        });
        if duplicate {
            return Err(AppError::new(
                ErrorCode::DuplicateReport,
                "you already have an open report against this user",
            ));
        }
        let id = next(&mut t.seq.reports);
        let record = Report {
            id,
            reporter_id: report.reporter_id,
            reported_id: report.reported_id,
            category: report.category,
            reason: report.reason,
            description: report.description,
            evidence: report.evidence,
            status: crate::models::ReportStatus::Pending,
            created_at: report.created_at,
            reviewer_id: None,
            reviewed_at: None,
            review_notes: None,
            sanction: None,
        };
        t.reports.insert(id, record.clone());
        Ok(record)
    }

    async fn reports_by_reporter(&self, reporter_id: i64) -> AppResult<Vec<Report>> {
        let t = self.tables.lock();
        let mut reports: Vec<Report> = t.reports.values().filter(|r| r.reporter_id == reporter_id).cloned().collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reports)
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<(Vec<Report>, u64)> {
        let t = self.tables.lock();
        let mut reports: Vec<Report> = t
            .reports
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        reports.sort_by(|a, b| {
            b.category
                .priority()
                .cmp(&a.category.priority())
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        let total = reports.len() as u64;
        let page = reports
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_report(&self, id: i64) -> AppResult<Option<Report>> {
        Ok(self.tables.lock().reports.get(&id).cloned())
    }

    async fn review_report(&self, decision: ReviewDecision) -> AppResult<Report> {
        let mut t = self.tables.lock();
        let report = t
            .reports
            .get(&decision.report_id)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))?;
        if !report.status.is_unresolved() {
            return Err(AppError::new(ErrorCode::ReportAlreadyReviewed, "this report has already been reviewed"));
        }

        if decision.sanction.is_ban() {
            let user = t
                .users
                .get_mut(&report.reported_id)
                .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "reported user not found"))?;
            user.is_active = false;
            user.reactivate_at = match decision.sanction {
                Sanction::TemporaryBan => decision.reactivate_at,
                _ => None,
            };
            user.updated_at = decision.reviewed_at;
        }

        let updated = Report {
            status: decision.action.into(),
            reviewer_id: Some(decision.reviewer_id),
            reviewed_at: Some(decision.reviewed_at),
            review_notes: decision.notes,
            sanction: Some(decision.sanction),
            ..report
        };
        t.reports.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn reports_involving(&self, user_id: i64) -> AppResult<Vec<Report>> {
        let t = self.tables.lock();
        Ok(t.reports
            .values()
            .filter(|r| r.reporter_id == user_id || r.reported_id == user_id)
            .cloned()
            .collect())
    }
}
