use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use kindred_shared::types::auth::UserRole;

pub const DEFAULT_MAX_DISTANCE_KM: i32 = 50;
pub const DEFAULT_AGE_RANGE_MIN: i32 = 18;
pub const DEFAULT_AGE_RANGE_MAX: i32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "non_binary",
            Gender::Other => "other",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "non_binary" => Ok(Gender::NonBinary),
            "other" => Ok(Gender::Other),
            _ => Err(format!("unknown gender: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub bio: String,
    pub location: Option<GeoPoint>,
    pub is_active: bool,
    pub role: UserRole,
    pub show_age: bool,
    pub max_distance_km: i32,
    pub age_range_min: i32,
    pub age_range_max: i32,
    pub interests: Vec<i32>,
    pub reactivate_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        age_on(self.birth_date, today)
    }
}

/// Full years between `birth_date` and `today`; the birthday itself counts.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfilePatch {
    #[validate(length(min = 1, max = 50, message = "display name must be 1 to 50 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    pub gender: Option<Gender>,
    pub show_age: Option<bool>,
    #[serde(alias = "max_distance")]
    #[validate(range(min = 1, max = 100, message = "max distance must be between 1 and 100 km"))]
    pub max_distance_km: Option<i32>,
    #[validate(range(min = 18, message = "minimum age must be at least 18"))]
    pub age_range_min: Option<i32>,
    #[validate(range(max = 120, message = "maximum age must be at most 120"))]
    pub age_range_max: Option<i32>,
    pub interests: Option<Vec<i32>>,
    pub location: Option<GeoPoint>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.gender.is_none()
            && self.show_age.is_none()
            && self.max_distance_km.is_none()
            && self.age_range_min.is_none()
            && self.age_range_max.is_none()
            && self.interests.is_none()
            && self.location.is_none()
    }

    pub fn apply_to(&self, user: &mut User) {
        if let Some(v) = &self.display_name {
            user.display_name = v.clone();
        }
        if let Some(v) = &self.bio {
            user.bio = v.clone();
        }
        if let Some(v) = self.gender {
            user.gender = v;
        }
        if let Some(v) = self.show_age {
            user.show_age = v;
        }
        if let Some(v) = self.max_distance_km {
            user.max_distance_km = v;
        }
        if let Some(v) = self.age_range_min {
            user.age_range_min = v;
        }
        if let Some(v) = self.age_range_max {
            user.age_range_max = v;
        }
        if let Some(v) = &self.interests {
            user.interests = v.clone();
        }
        if let Some(v) = self.location {
            user.location = Some(v);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub url: String,
    pub is_primary: bool,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub user_id: i64,
    pub url: String,
    pub is_primary: bool,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgeRange {
    pub min: i32,
    pub max: i32,
}

/// The owner's view of their own profile.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub age: i32,
    pub gender: Gender,
    pub bio: String,
    pub location: Option<GeoPoint>,
    pub show_age: bool,
    pub max_distance: i32,
    pub age_range: AgeRange,
    pub interests: Vec<i32>,
    pub photos: Vec<Photo>,
    pub role: UserRole,
    pub is_active: bool,
}

impl ProfileView {
    pub fn new(user: &User, photos: Vec<Photo>, today: NaiveDate) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            birth_date: user.birth_date,
            age: user.age_on(today),
            gender: user.gender,
            bio: user.bio.clone(),
            location: user.location,
            show_age: user.show_age,
            max_distance: user.max_distance_km,
            age_range: AgeRange {
                min: user.age_range_min,
                max: user.age_range_max,
            },
            interests: user.interests.clone(),
            photos,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

/// Public projection of a user shown in discovery and chat lists.
#[derive(Debug, Clone, Serialize)]
pub struct UserCard {
    pub id: i64,
    pub display_name: String,
    pub age: Option<i32>,
    pub bio: String,
    pub photos: Vec<Photo>,
    pub interests: Vec<i32>,
    pub distance_km: Option<f64>,
}

impl UserCard {
    pub fn new(user: &User, photos: Vec<Photo>, today: NaiveDate, distance_km: Option<f64>) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            age: user.show_age.then(|| user.age_on(today)),
            bio: user.bio.clone(),
            photos,
            interests: user.interests.clone(),
            distance_km,
        }
    }
}
