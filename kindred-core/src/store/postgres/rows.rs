use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use kindred_shared::{AppError, AppResult};

use super::schema::{blocks, interests, likes, matches, messages, passes, photos, reports, users};
use crate::models::{
    Block, GeoPoint, Interest, Match, Message, NewBlock, NewMessage, NewPhoto, NewReport, NewUser,
    Photo, Report, Sanction, User,
};

fn parse<T: std::str::FromStr<Err = String>>(value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|e: String| AppError::internal(format!("corrupt row: {e}")))
}

// --- User ---

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub bio: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
    pub role: String,
    pub show_age: bool,
    pub max_distance_km: i32,
    pub age_range_min: i32,
    pub age_range_max: i32,
    pub interests: Vec<i32>,
    pub reactivate_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_domain(self) -> AppResult<User> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        };
        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            display_name: self.display_name,
            birth_date: self.birth_date,
            gender: parse(&self.gender)?,
            bio: self.bio,
            location,
            is_active: self.is_active,
            role: parse(&self.role)?,
            show_age: self.show_age,
            max_distance_km: self.max_distance_km,
            age_range_min: self.age_range_min,
            age_range_max: self.age_range_max,
            interests: self.interests,
            reactivate_at: self.reactivate_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub display_name: &'a str,
    pub birth_date: NaiveDate,
    pub gender: &'a str,
    pub role: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a NewUser> for NewUserRow<'a> {
    fn from(u: &'a NewUser) -> Self {
        Self {
            email: &u.email,
            password_hash: &u.password_hash,
            display_name: &u.display_name,
            birth_date: u.birth_date,
            gender: u.gender.as_str(),
            role: u.role.as_str(),
            created_at: u.created_at,
            updated_at: u.created_at,
        }
    }
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub show_age: Option<bool>,
    pub max_distance_km: Option<i32>,
    pub age_range_min: Option<i32>,
    pub age_range_max: Option<i32>,
    pub interests: Option<Vec<i32>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Photo ---

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = photos)]
pub struct PhotoRow {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub is_primary: bool,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PhotoRow> for Photo {
    fn from(p: PhotoRow) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            url: p.url,
            is_primary: p.is_primary,
            caption: p.caption,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = photos)]
pub struct NewPhotoRow<'a> {
    pub user_id: i64,
    pub url: &'a str,
    pub is_primary: bool,
    pub caption: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

impl<'a> NewPhotoRow<'a> {
    pub fn new(p: &'a NewPhoto, is_primary: bool) -> Self {
        Self {
            user_id: p.user_id,
            url: &p.url,
            is_primary,
            caption: p.caption.as_deref(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = interests)]
pub struct InterestRow {
    pub id: i32,
    pub name: String,
    pub category: String,
}

impl InterestRow {
    pub fn into_domain(self) -> AppResult<Interest> {
        Ok(Interest {
            id: self.id,
            name: self.name,
            category: parse(&self.category)?,
        })
    }
}

// --- Relations ---

#[derive(Debug, Insertable)]
#[diesel(table_name = likes)]
pub struct NewLikeRow {
    pub from_user: i64,
    pub to_user: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = passes)]
pub struct NewPassRow {
    pub from_user: i64,
    pub to_user: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = matches)]
pub struct MatchRow {
    pub id: i64,
    pub user_a: i64,
    pub user_b: i64,
    pub created_at: DateTime<Utc>,
    pub unmatched_at: Option<DateTime<Utc>>,
}

impl From<MatchRow> for Match {
    fn from(m: MatchRow) -> Self {
        Self {
            id: m.id,
            user_a: m.user_a,
            user_b: m.user_b,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatchRow {
    pub user_a: i64,
    pub user_b: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = blocks)]
pub struct BlockRow {
    pub id: i64,
    pub blocker_id: i64,
    pub blocked_id: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlockRow {
    pub fn into_domain(self) -> AppResult<Block> {
        Ok(Block {
            id: self.id,
            blocker_id: self.blocker_id,
            blocked_id: self.blocked_id,
            reason: parse(&self.reason)?,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = blocks)]
pub struct NewBlockRow<'a> {
    pub blocker_id: i64,
    pub blocked_id: i64,
    pub reason: &'a str,
    pub notes: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewBlock> for NewBlockRow<'a> {
    fn from(b: &'a NewBlock) -> Self {
        Self {
            blocker_id: b.blocker_id,
            blocked_id: b.blocked_id,
            reason: b.reason.as_str(),
            notes: b.notes.as_deref(),
            created_at: b.created_at,
        }
    }
}

// --- Messages ---

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = messages)]
pub struct MessageRow {
    pub id: i64,
    pub match_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub message_type: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub fn into_domain(self) -> AppResult<Message> {
        Ok(Message {
            id: self.id,
            match_id: self.match_id,
            sender_id: self.sender_id,
            content: self.content,
            message_type: parse(&self.message_type)?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessageRow<'a> {
    pub match_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
    pub message_type: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> NewMessageRow<'a> {
    pub fn new(m: &'a NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            match_id: m.match_id,
            sender_id: m.sender_id,
            content: &m.content,
            message_type: m.message_type.as_str(),
            created_at,
        }
    }
}

// --- Reports ---

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = reports)]
pub struct ReportRow {
    pub id: i64,
    pub reporter_id: i64,
    pub reported_id: i64,
    pub category: String,
    pub priority: i32,
    pub reason: String,
    pub description: String,
    pub evidence: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub sanction: Option<String>,
}

impl ReportRow {
    pub fn into_domain(self) -> AppResult<Report> {
        Ok(Report {
            id: self.id,
            reporter_id: self.reporter_id,
            reported_id: self.reported_id,
            category: parse(&self.category)?,
            reason: self.reason,
            description: self.description,
            evidence: self.evidence,
            status: parse(&self.status)?,
            created_at: self.created_at,
            reviewer_id: self.reviewer_id,
            reviewed_at: self.reviewed_at,
            review_notes: self.review_notes,
            sanction: self.sanction.as_deref().map(parse::<Sanction>).transpose()?,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReportRow<'a> {
    pub reporter_id: i64,
    pub reported_id: i64,
    pub category: &'a str,
    pub priority: i32,
    pub reason: &'a str,
    pub description: &'a str,
    pub evidence: Option<&'a str>,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewReport> for NewReportRow<'a> {
    fn from(r: &'a NewReport) -> Self {
        Self {
            reporter_id: r.reporter_id,
            reported_id: r.reported_id,
            category: r.category.as_str(),
            priority: r.category.priority(),
            reason: &r.reason,
            description: &r.description,
            evidence: r.evidence.as_deref(),
            status: "pending",
            created_at: r.created_at,
        }
    }
}

pub fn users_into_domain(rows: Vec<UserRow>) -> AppResult<Vec<User>> {
    rows.into_iter().map(UserRow::into_domain).collect()
}
