//! Accounts, credentials and profiles.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use validator::Validate;

use kindred_shared::tokens::{hash_token, TokenIssuer};
use kindred_shared::{AppError, AppResult, ErrorCode, TokenPair, UserRole};

use crate::clock::Clock;
use crate::models::{age_on, Gender, Interest, NewPhoto, NewUser, Photo, ProfilePatch, ProfileView, User};
use crate::store::Store;

pub mod password;
pub mod photos;

pub use password::{validate_password, Argon2Hasher, PasswordHasher};
pub use photos::{ImageKind, MemoryPhotoStore, PhotoStore};

pub const MINIMUM_AGE: i32 = 18;
pub const DEFAULT_MAX_PHOTOS: usize = 6;
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 8 * 1024 * 1024;
const MAX_CAPTION_CHARS: usize = 200;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    pub birth_date: NaiveDate,
    #[validate(length(min = 1, max = 50, message = "display name must be 1 to 50 characters"))]
    pub display_name: String,
    pub gender: Gender,
}

#[derive(Debug)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub is_primary: bool,
    pub caption: Option<String>,
}

/// Successful login: the token pair and the account it was issued for.
#[derive(Debug)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub max_photos: usize,
    pub max_photo_bytes: usize,
    /// Accounts with one of these emails are admins.
    pub admin_emails: Vec<String>,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            max_photos: DEFAULT_MAX_PHOTOS,
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
            admin_emails: Vec::new(),
        }
    }
}

/// Field name to messages, e.g. `{"bio": ["bio must be at most 500 characters"]}`.
fn validation_error(e: validator::ValidationErrors) -> AppError {
    let fields: serde_json::Map<String, serde_json::Value> = e
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|err| match &err.message {
                    Some(message) => message.to_string(),
                    None => err.code.to_string(),
                })
                .collect::<Vec<_>>();
            (field.to_string(), serde_json::json!(messages))
        })
        .collect();
    AppError::with_details(ErrorCode::ValidationError, "validation failed", serde_json::Value::Object(fields))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct IdentityService {
    store: Arc<dyn Store>,
    hasher: Arc<dyn PasswordHasher>,
    photos: Arc<dyn PhotoStore>,
    tokens: Arc<TokenIssuer>,
    clock: Arc<dyn Clock>,
    settings: IdentitySettings,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn PasswordHasher>,
        photos: Arc<dyn PhotoStore>,
        tokens: Arc<TokenIssuer>,
        clock: Arc<dyn Clock>,
        settings: IdentitySettings,
    ) -> Self {
        Self {
            store,
            hasher,
            photos,
            tokens,
            clock,
            settings,
        }
    }

    pub async fn register(&self, mut input: RegisterInput) -> AppResult<User> {
        input.email = normalize_email(&input.email);
        input.validate().map_err(validation_error)?;
        validate_password(&input.password)?;
        if input.display_name.trim().is_empty() {
            return Err(AppError::new(ErrorCode::InvalidDisplayName, "display name must not be blank"));
        }

        let now = self.clock.now();
        if age_on(input.birth_date, now.date_naive()) < MINIMUM_AGE {
            return Err(AppError::new(
                ErrorCode::Underage,
                format!("you must be at least {MINIMUM_AGE} years old to register"),
            ));
        }

        let email = input.email;
        let role = if self.is_admin_email(&email) {
            UserRole::Admin
        } else {
            UserRole::User
        };
        let password_hash = self.hash_password(input.password).await?;

        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash,
                display_name: input.display_name.trim().to_string(),
                birth_date: input.birth_date,
                gender: input.gender,
                role,
                created_at: now,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Verifies credentials and account standing. A temporary ban that has
    /// run out is lifted here.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");

        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;
        if !self.verify_password(password.to_string(), user.password_hash.clone()).await? {
            return Err(invalid());
        }
        let mut user = self.ensure_active(user).await?;
        // Emails added to the admin list after signup are promoted on next login.
        if user.role == UserRole::User && self.is_admin_email(&user.email) {
            self.store.set_role(user.id, UserRole::Admin).await?;
            tracing::info!(user_id = user.id, "account promoted to admin");
            user.role = UserRole::Admin;
        }
        Ok(user)
    }

    fn is_admin_email(&self, email: &str) -> bool {
        self.settings.admin_emails.iter().any(|a| normalize_email(a) == email)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let user = self.authenticate(email, password).await?;
        let tokens = self.issue_tokens(&user).await?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(LoginOutcome { tokens, user })
    }

    /// Rotates a refresh token; each refresh token is accepted once.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let user_id = self
            .store
            .consume_refresh_token(&hash_token(refresh_token), self.clock.now())
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::RefreshTokenRevoked, "refresh token is invalid or expired"))?;
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
        let user = self.ensure_active(user).await?;
        let tokens = self.issue_tokens(&user).await?;
        tracing::debug!(user_id, "refresh token rotated");
        Ok(tokens)
    }

    pub async fn get_profile(&self, user_id: i64) -> AppResult<ProfileView> {
        let user = self.require_user(user_id).await?;
        self.profile_view(user).await
    }

    pub async fn update_profile(&self, user_id: i64, mut patch: ProfilePatch) -> AppResult<ProfileView> {
        patch.validate().map_err(validation_error)?;
        let current = self.require_user(user_id).await?;

        if let Some(name) = patch.display_name.as_mut() {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(AppError::new(ErrorCode::InvalidDisplayName, "display name must not be blank"));
            }
            *name = trimmed.to_string();
        }

        let min = patch.age_range_min.unwrap_or(current.age_range_min);
        let max = patch.age_range_max.unwrap_or(current.age_range_max);
        if max < min {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "maximum age must not be below minimum age",
            ));
        }

        if let Some(location) = patch.location {
            if !(-90.0..=90.0).contains(&location.latitude) || !(-180.0..=180.0).contains(&location.longitude) {
                return Err(AppError::new(ErrorCode::ValidationError, "location is out of range"));
            }
        }

        if let Some(interests) = patch.interests.as_mut() {
            interests.sort_unstable();
            interests.dedup();
            if !interests.is_empty() {
                let catalog: HashSet<i32> = self.store.interests().await?.into_iter().map(|i| i.id).collect();
                if let Some(unknown) = interests.iter().find(|id| !catalog.contains(*id)) {
                    return Err(AppError::new(
                        ErrorCode::ValidationError,
                        format!("unknown interest id: {unknown}"),
                    ));
                }
            }
        }

        let user = self.store.update_profile(user_id, &patch, self.clock.now()).await?;
        if !patch.is_empty() {
            tracing::info!(user_id, "profile updated");
        }
        self.profile_view(user).await
    }

    pub async fn add_photo(&self, user_id: i64, upload: PhotoUpload) -> AppResult<Photo> {
        if upload.bytes.len() > self.settings.max_photo_bytes {
            return Err(AppError::new(
                ErrorCode::PayloadTooLarge,
                format!("photo exceeds the {} byte limit", self.settings.max_photo_bytes),
            ));
        }
        let kind = ImageKind::sniff(&upload.bytes).ok_or_else(|| {
            AppError::new(ErrorCode::InvalidPhoto, "unsupported image format, accepted: jpeg, png, webp, gif")
        })?;
        let caption = upload.caption.filter(|c| !c.trim().is_empty());
        if caption.as_ref().is_some_and(|c| c.chars().count() > MAX_CAPTION_CHARS) {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                format!("caption must be at most {MAX_CAPTION_CHARS} characters"),
            ));
        }

        self.require_user(user_id).await?;
        let existing = self
            .store
            .photos_for(&[user_id])
            .await?
            .remove(&user_id)
            .map_or(0, |p| p.len());
        if existing >= self.settings.max_photos {
            return Err(AppError::new(
                ErrorCode::PhotoLimitReached,
                format!("a profile can hold at most {} photos", self.settings.max_photos),
            ));
        }

        let url = self.photos.put(user_id, upload.bytes, kind).await?;
        let inserted = self
            .store
            .add_photo(
                NewPhoto {
                    user_id,
                    url: url.clone(),
                    is_primary: upload.is_primary,
                    caption,
                    created_at: self.clock.now(),
                },
                self.settings.max_photos,
            )
            .await;
        let photo = match inserted {
            Ok(photo) => photo,
            Err(e) => {
                // The limit is re-checked under the user lock; a lost race leaves no object behind.
                self.discard_object(&url).await;
                return Err(e);
            }
        };

        tracing::info!(user_id, photo_id = photo.id, primary = photo.is_primary, "photo added");
        Ok(photo)
    }

    /// Removes one of the caller's photos and its stored object. The oldest
    /// remaining photo takes over as primary.
    pub async fn delete_photo(&self, user_id: i64, photo_id: i64) -> AppResult<()> {
        let photo = self.owned_photo(user_id, photo_id).await?;
        self.store.delete_photo(photo.id).await?;
        self.discard_object(&photo.url).await;
        tracing::info!(user_id, photo_id, was_primary = photo.is_primary, "photo deleted");
        Ok(())
    }

    pub async fn set_primary_photo(&self, user_id: i64, photo_id: i64) -> AppResult<Photo> {
        self.owned_photo(user_id, photo_id).await?;
        let photo = self.store.set_primary_photo(photo_id).await?;
        tracing::info!(user_id, photo_id, "primary photo changed");
        Ok(photo)
    }

    pub async fn interests(&self) -> AppResult<Vec<Interest>> {
        self.store.interests().await
    }

    async fn owned_photo(&self, user_id: i64, photo_id: i64) -> AppResult<Photo> {
        let photo = self
            .store
            .find_photo(photo_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::PhotoNotFound, "photo not found"))?;
        if photo.user_id != user_id {
            return Err(AppError::new(ErrorCode::NotPhotoOwner, "this photo belongs to another user"));
        }
        Ok(photo)
    }

    async fn discard_object(&self, url: &str) {
        if let Err(e) = self.photos.delete(url).await {
            tracing::warn!(url, error = %e, "failed to delete photo object");
        }
    }

    async fn require_user(&self, user_id: i64) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))
    }

    async fn profile_view(&self, user: User) -> AppResult<ProfileView> {
        let photos = self.store.photos_for(&[user.id]).await?.remove(&user.id).unwrap_or_default();
        Ok(ProfileView::new(&user, photos, self.clock.today()))
    }

    async fn ensure_active(&self, mut user: User) -> AppResult<User> {
        if user.is_active {
            return Ok(user);
        }
        let now = self.clock.now();
        match user.reactivate_at {
            Some(at) if at <= now => {
                self.store.reactivate_user(user.id, now).await?;
                tracing::info!(user_id = user.id, "temporary ban expired, account reactivated");
                user.is_active = true;
                user.reactivate_at = None;
                Ok(user)
            }
            Some(at) => Err(AppError::new(
                ErrorCode::UserBanned,
                format!("account suspended until {}", at.format("%Y-%m-%d %H:%M UTC")),
            )),
            None => Err(AppError::new(ErrorCode::UserBanned, "account permanently banned")),
        }
    }

    async fn issue_tokens(&self, user: &User) -> AppResult<TokenPair> {
        let (pair, refresh_hash) = self.tokens.create_token_pair(user.id, user.role)?;
        let expires_at = self.clock.now() + Duration::seconds(self.tokens.refresh_ttl_secs());
        self.store.store_refresh_token(user.id, &refresh_hash, expires_at).await?;
        Ok(pair)
    }

    async fn hash_password(&self, password: String) -> AppResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(&self, password: String, hash: String) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::GeoPoint;
    use crate::store::MemoryStore;

    struct Fixture {
        service: IdentityService,
        clock: Arc<ManualClock>,
        photos: Arc<MemoryPhotoStore>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let photos = Arc::new(MemoryPhotoStore::new());
        let service = IdentityService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Argon2Hasher::with_cost(1024, 1).unwrap()),
            photos.clone(),
            Arc::new(TokenIssuer::new("test-secret", 3600, 86_400)),
            clock.clone(),
            IdentitySettings {
                max_photos: 2,
                max_photo_bytes: 64,
                admin_emails: vec!["Root@Example.com".into()],
            },
        );
        Fixture { service, clock, photos }
    }

    fn input(email: &str, birth_date: NaiveDate) -> RegisterInput {
        RegisterInput {
            email: email.into(),
            password: "SecurePassword123".into(),
            birth_date,
            display_name: "John".into(),
            gender: Gender::Male,
        }
    }

    fn png() -> Vec<u8> {
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]
    }

    #[tokio::test]
    async fn register_normalizes_email_and_rejects_duplicates() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1995, 6, 15).unwrap();
        let user = f.service.register(input(" User@Example.com ", born)).await.unwrap();
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.role, UserRole::User);

        let err = f.service.register(input("user@example.com", born)).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::EmailAlreadyExists));
    }

    #[tokio::test]
    async fn eighteenth_birthday_is_old_enough() {
        let f = fixture();
        let err = f
            .service
            .register(input("young@example.com", NaiveDate::from_ymd_opt(2008, 3, 2).unwrap()))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::Underage));
        assert!(err.to_string().contains("18"));

        f.service
            .register(input("adult@example.com", NaiveDate::from_ymd_opt(2008, 3, 1).unwrap()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn configured_admin_emails_get_admin_role() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = f.service.register(input("root@example.com", born)).await.unwrap();
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn listed_admin_is_promoted_on_login() {
        let store: Arc<dyn crate::store::Store> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let service = |admin_emails: Vec<String>| {
            IdentityService::new(
                store.clone(),
                Arc::new(Argon2Hasher::with_cost(1024, 1).unwrap()),
                Arc::new(MemoryPhotoStore::new()),
                Arc::new(TokenIssuer::new("test-secret", 3600, 86_400)),
                clock.clone(),
                IdentitySettings {
                    admin_emails,
                    ..Default::default()
                },
            )
        };

        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = service(vec![]).register(input("late@example.com", born)).await.unwrap();
        assert_eq!(user.role, UserRole::User);

        let outcome = service(vec!["late@example.com".into()])
            .login("late@example.com", "SecurePassword123")
            .await
            .unwrap();
        assert_eq!(outcome.user.role, UserRole::Admin);
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().role, UserRole::Admin);
    }

    #[tokio::test]
    async fn weak_password_and_bad_email_are_rejected() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let mut weak = input("a@example.com", born);
        weak.password = "password".into();
        assert_eq!(f.service.register(weak).await.unwrap_err().error_code(), Some(ErrorCode::PasswordTooWeak));

        let err = f.service.register(input("not-an-email", born)).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn login_and_single_use_refresh() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        f.service.register(input("user@example.com", born)).await.unwrap();

        let wrong = f.service.login("user@example.com", "nope12345").await.unwrap_err();
        assert_eq!(wrong.error_code(), Some(ErrorCode::InvalidCredentials));

        let outcome = f.service.login("USER@example.com", "SecurePassword123").await.unwrap();
        let rotated = f.service.refresh(&outcome.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, outcome.tokens.refresh_token);

        let reused = f.service.refresh(&outcome.tokens.refresh_token).await.unwrap_err();
        assert_eq!(reused.error_code(), Some(ErrorCode::RefreshTokenRevoked));
    }

    #[tokio::test]
    async fn update_profile_validates_and_applies() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = f.service.register(input("user@example.com", born)).await.unwrap();

        let empty = f.service.update_profile(user.id, ProfilePatch::default()).await.unwrap();
        assert_eq!(empty.display_name, "John");

        let patch = ProfilePatch {
            bio: Some("hiking and tea".into()),
            interests: Some(vec![3, 1, 3]),
            location: Some(GeoPoint { latitude: 25.03, longitude: 121.56 }),
            max_distance_km: Some(20),
            ..Default::default()
        };
        let view = f.service.update_profile(user.id, patch).await.unwrap();
        assert_eq!(view.interests, vec![1, 3]);
        assert_eq!(view.max_distance, 20);
        assert_eq!(view.age, 36);

        for bad in [
            ProfilePatch { max_distance_km: Some(101), ..Default::default() },
            ProfilePatch { age_range_min: Some(17), ..Default::default() },
            ProfilePatch { age_range_min: Some(40), age_range_max: Some(30), ..Default::default() },
            ProfilePatch { display_name: Some("x".repeat(51)), ..Default::default() },
            ProfilePatch { location: Some(GeoPoint { latitude: 91.0, longitude: 0.0 }), ..Default::default() },
        ] {
            let err = f.service.update_profile(user.id, bad).await.unwrap_err();
            assert_eq!(err.status_code().as_u16(), 400);
        }
    }

    #[tokio::test]
    async fn photos_are_sniffed_capped_and_primary_is_unique() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = f.service.register(input("user@example.com", born)).await.unwrap();

        let upload = |is_primary| PhotoUpload {
            bytes: png(),
            is_primary,
            caption: None,
        };

        let not_image = PhotoUpload {
            bytes: b"plain text".to_vec(),
            is_primary: false,
            caption: None,
        };
        assert_eq!(
            f.service.add_photo(user.id, not_image).await.unwrap_err().error_code(),
            Some(ErrorCode::InvalidPhoto)
        );
        let too_big = PhotoUpload {
            bytes: vec![0xFF; 65],
            is_primary: false,
            caption: None,
        };
        assert_eq!(f.service.add_photo(user.id, too_big).await.unwrap_err().status_code().as_u16(), 413);

        let first = f.service.add_photo(user.id, upload(false)).await.unwrap();
        assert!(first.is_primary);
        let second = f.service.add_photo(user.id, upload(true)).await.unwrap();
        assert!(second.is_primary);

        let view = f.service.get_profile(user.id).await.unwrap();
        assert_eq!(view.photos.iter().filter(|p| p.is_primary).count(), 1);

        let err = f.service.add_photo(user.id, upload(false)).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::PhotoLimitReached));
        assert_eq!(f.photos.len(), 2);
    }

    #[tokio::test]
    async fn expired_temporary_ban_is_lifted_on_login() {
        use crate::models::{NewReport, ReportCategory, ReviewAction, ReviewDecision, Sanction};
        use crate::store::ModerationStore;

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let service = IdentityService::new(
            store.clone(),
            Arc::new(Argon2Hasher::with_cost(1024, 1).unwrap()),
            Arc::new(MemoryPhotoStore::new()),
            Arc::new(TokenIssuer::new("test-secret", 3600, 86_400)),
            clock.clone(),
            IdentitySettings::default(),
        );
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let reporter = service.register(input("a@example.com", born)).await.unwrap();
        let target = service.register(input("b@example.com", born)).await.unwrap();

        let report = store
            .create_report(NewReport {
                reporter_id: reporter.id,
                reported_id: target.id,
                category: ReportCategory::Spam,
                reason: String::new(),
                description: "sends the same link to everyone".into(),
                evidence: None,
                created_at: clock.now(),
            })
            .await
            .unwrap();
        store
            .review_report(ReviewDecision {
                report_id: report.id,
                reviewer_id: reporter.id,
                action: ReviewAction::Approved,
                notes: None,
                sanction: Sanction::TemporaryBan,
                reactivate_at: Some(clock.now() + Duration::days(1)),
                reviewed_at: clock.now(),
            })
            .await
            .unwrap();

        let banned = service.login("b@example.com", "SecurePassword123").await.unwrap_err();
        assert_eq!(banned.error_code(), Some(ErrorCode::UserBanned));

        clock.advance(Duration::days(2));
        let outcome = service.login("b@example.com", "SecurePassword123").await.unwrap();
        assert!(outcome.user.is_active);
    }

    #[tokio::test]
    async fn interests_come_from_the_catalog() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = f.service.register(input("user@example.com", born)).await.unwrap();

        let catalog = f.service.interests().await.unwrap();
        assert_eq!(catalog.len(), crate::models::DEFAULT_INTERESTS.len());
        assert_eq!(catalog[0].name, "Photography");

        let unknown = ProfilePatch {
            interests: Some(vec![1, 999]),
            ..Default::default()
        };
        let err = f.service.update_profile(user.id, unknown).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::ValidationError));
        assert!(err.to_string().contains("999"));

        let cleared = ProfilePatch {
            interests: Some(vec![]),
            ..Default::default()
        };
        assert!(f.service.update_profile(user.id, cleared).await.unwrap().interests.is_empty());
    }

    #[tokio::test]
    async fn primary_photo_moves_on_delete_and_on_request() {
        let f = fixture();
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = f.service.register(input("user@example.com", born)).await.unwrap();
        let other = f.service.register(input("other@example.com", born)).await.unwrap();
        let upload = || PhotoUpload {
            bytes: png(),
            is_primary: false,
            caption: None,
        };

        let first = f.service.add_photo(user.id, upload()).await.unwrap();
        let second = f.service.add_photo(user.id, upload()).await.unwrap();
        assert!(first.is_primary && !second.is_primary);

        let promoted = f.service.set_primary_photo(user.id, second.id).await.unwrap();
        assert!(promoted.is_primary);
        let view = f.service.get_profile(user.id).await.unwrap();
        let primaries: Vec<i64> = view.photos.iter().filter(|p| p.is_primary).map(|p| p.id).collect();
        assert_eq!(primaries, vec![second.id]);

        let err = f.service.delete_photo(other.id, second.id).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::NotPhotoOwner));
        let err = f.service.set_primary_photo(user.id, 9999).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::PhotoNotFound));

        f.service.delete_photo(user.id, second.id).await.unwrap();
        let view = f.service.get_profile(user.id).await.unwrap();
        assert_eq!(view.photos.len(), 1);
        assert_eq!(view.photos[0].id, first.id);
        assert!(view.photos[0].is_primary);
        assert_eq!(f.photos.len(), 1);

        f.service.delete_photo(user.id, first.id).await.unwrap();
        assert!(f.service.get_profile(user.id).await.unwrap().photos.is_empty());
        assert!(f.photos.is_empty());
    }

    /// Lands a competing photo row between the byte upload and the insert.
    struct RacingPhotos {
        inner: MemoryPhotoStore,
        store: Arc<MemoryStore>,
    }

    #[async_trait::async_trait]
    impl PhotoStore for RacingPhotos {
        async fn put(&self, user_id: i64, bytes: Vec<u8>, kind: ImageKind) -> AppResult<String> {
            use crate::store::IdentityStore;

            self.store
                .add_photo(
                    NewPhoto {
                        user_id,
                        url: "memory://profiles/elsewhere.png".into(),
                        is_primary: false,
                        caption: None,
                        created_at: Utc::now(),
                    },
                    1,
                )
                .await?;
            self.inner.put(user_id, bytes, kind).await
        }

        async fn delete(&self, url: &str) -> AppResult<()> {
            self.inner.delete(url).await
        }
    }

    #[tokio::test]
    async fn upload_that_loses_the_limit_race_leaves_no_object() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RacingPhotos {
            inner: MemoryPhotoStore::new(),
            store: store.clone(),
        });
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let service = IdentityService::new(
            store,
            Arc::new(Argon2Hasher::with_cost(1024, 1).unwrap()),
            photos.clone(),
            Arc::new(TokenIssuer::new("test-secret", 3600, 86_400)),
            clock,
            IdentitySettings {
                max_photos: 1,
                ..IdentitySettings::default()
            },
        );
        let born = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let user = service.register(input("user@example.com", born)).await.unwrap();

        let upload = PhotoUpload {
            bytes: png(),
            is_primary: true,
            caption: None,
        };
        let err = service.add_photo(user.id, upload).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::PhotoLimitReached));
        assert!(photos.inner.is_empty());
    }
}
