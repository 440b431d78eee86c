use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use kindred_shared::{AppError, AppResult, ErrorCode, UserRole};

use super::rows::{InterestRow, NewPhotoRow, NewUserRow, PhotoRow, UserChanges, UserRow};
use super::schema::{interests, photos, refresh_tokens, users};
use super::PgStore;
use crate::models::{Interest, NewPhoto, NewUser, Photo, ProfilePatch, User};
use crate::store::IdentityStore;

fn changes_from(patch: &ProfilePatch, now: DateTime<Utc>) -> UserChanges {
    UserChanges {
        display_name: patch.display_name.clone(),
        bio: patch.bio.clone(),
        gender: patch.gender.map(|g| g.as_str().to_string()),
        show_age: patch.show_age,
        max_distance_km: patch.max_distance_km,
        age_range_min: patch.age_range_min,
        age_range_max: patch.age_range_max,
        interests: patch.interests.clone(),
        latitude: patch.location.map(|l| l.latitude),
        longitude: patch.location.map(|l| l.longitude),
        updated_at: Some(now),
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        self.run(move |conn| {
            let inserted = diesel::insert_into(users::table)
                .values(NewUserRow::from(&user))
                .get_result::<UserRow>(conn);
            match inserted {
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"))
                }
                other => other?.into_domain(),
            }
        })
        .await
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        self.run(move |conn| {
            users::table
                .find(id)
                .first::<UserRow>(conn)
                .optional()?
                .map(UserRow::into_domain)
                .transpose()
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = email.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(&email))
                .first::<UserRow>(conn)
                .optional()?
                .map(UserRow::into_domain)
                .transpose()
        })
        .await
    }

    async fn find_users(&self, ids: &[i64]) -> AppResult<Vec<User>> {
        let ids = ids.to_vec();
        self.run(move |conn| {
            let rows = users::table
                .filter(users::id.eq_any(&ids))
                .load::<UserRow>(conn)?;
            super::rows::users_into_domain(rows)
        })
        .await
    }

    async fn update_profile(&self, id: i64, patch: &ProfilePatch, now: DateTime<Utc>) -> AppResult<User> {
        let changes = (!patch.is_empty()).then(|| changes_from(patch, now));
        self.run(move |conn| {
            let row = match changes {
                Some(changes) => diesel::update(users::table.find(id))
                    .set(&changes)
                    .get_result::<UserRow>(conn)
                    .optional()?,
                None => users::table.find(id).first::<UserRow>(conn).optional()?,
            };
            row.ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?
                .into_domain()
        })
        .await
    }

    async fn set_role(&self, id: i64, role: UserRole) -> AppResult<()> {
        self.run(move |conn| {
            let updated = diesel::update(users::table.find(id))
                .set(users::role.eq(role.as_str()))
                .execute(conn)?;
            if updated == 0 {
                return Err(AppError::new(ErrorCode::ProfileNotFound, "user not found"));
            }
            Ok(())
        })
        .await
    }

    async fn photos_for(&self, user_ids: &[i64]) -> AppResult<HashMap<i64, Vec<Photo>>> {
        let ids = user_ids.to_vec();
        self.run(move |conn| {
            let rows = photos::table
                .filter(photos::user_id.eq_any(&ids))
                .order((photos::user_id.asc(), photos::id.asc()))
                .load::<PhotoRow>(conn)?;
            let mut out: HashMap<i64, Vec<Photo>> = HashMap::new();
            for row in rows {
                out.entry(row.user_id).or_default().push(row.into());
            }
            Ok(out)
        })
        .await
    }

    async fn add_photo(&self, photo: NewPhoto, max_photos: usize) -> AppResult<Photo> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                users::table
                    .find(photo.user_id)
                    .select(users::id)
                    .for_update()
                    .first::<i64>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?;

                let existing: i64 = photos::table
                    .filter(photos::user_id.eq(photo.user_id))
                    .count()
                    .get_result(conn)?;
                if existing as usize >= max_photos {
                    return Err(AppError::new(
                        ErrorCode::PhotoLimitReached,
                        format!("a profile can hold at most {max_photos} photos"),
                    ));
                }

                let is_primary = photo.is_primary || existing == 0;
                if is_primary {
                    diesel::update(photos::table.filter(photos::user_id.eq(photo.user_id)))
                        .set(photos::is_primary.eq(false))
                        .execute(conn)?;
                }

                let row = diesel::insert_into(photos::table)
                    .values(NewPhotoRow::new(&photo, is_primary))
                    .get_result::<PhotoRow>(conn)?;
                Ok(row.into())
            })
        })
        .await
    }

    async fn find_photo(&self, id: i64) -> AppResult<Option<Photo>> {
        self.run(move |conn| {
            Ok(photos::table
                .find(id)
                .first::<PhotoRow>(conn)
                .optional()?
                .map(Photo::from))
        })
        .await
    }

    async fn delete_photo(&self, id: i64) -> AppResult<()> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let Some(removed) = diesel::delete(photos::table.find(id))
                    .get_result::<PhotoRow>(conn)
                    .optional()?
                else {
                    return Ok(());
                };
                if removed.is_primary {
                    let oldest = photos::table
                        .filter(photos::user_id.eq(removed.user_id))
                        .order(photos::id.asc())
                        .select(photos::id)
                        .first::<i64>(conn)
                        .optional()?;
                    if let Some(oldest) = oldest {
                        diesel::update(photos::table.find(oldest))
                            .set(photos::is_primary.eq(true))
                            .execute(conn)?;
                    }
                }
                Ok(())
            })
        })
        .await
    }

    async fn set_primary_photo(&self, id: i64) -> AppResult<Photo> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let owner = photos::table
                    .find(id)
                    .select(photos::user_id)
                    .for_update()
                    .first::<i64>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::new(ErrorCode::PhotoNotFound, "photo not found"))?;
                // Clear first: the partial unique index allows one primary per user.
                diesel::update(photos::table.filter(photos::user_id.eq(owner)).filter(photos::id.ne(id)))
                    .set(photos::is_primary.eq(false))
                    .execute(conn)?;
                let row = diesel::update(photos::table.find(id))
                    .set(photos::is_primary.eq(true))
                    .get_result::<PhotoRow>(conn)?;
                Ok(row.into())
            })
        })
        .await
    }

    async fn interests(&self) -> AppResult<Vec<Interest>> {
        self.run(|conn| {
            interests::table
                .filter(interests::is_active.eq(true))
                .order(interests::id.asc())
                .select(InterestRow::as_select())
                .load::<InterestRow>(conn)?
                .into_iter()
                .map(InterestRow::into_domain)
                .collect()
        })
        .await
    }

    async fn reactivate_user(&self, id: i64, now: DateTime<Utc>) -> AppResult<()> {
        self.run(move |conn| {
            diesel::update(users::table.find(id))
                .set((
                    users::is_active.eq(true),
                    users::reactivate_at.eq(None::<DateTime<Utc>>),
                    users::updated_at.eq(now),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn reactivate_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<i64>> {
        self.run(move |conn| {
            let ids = diesel::update(
                users::table
                    .filter(users::is_active.eq(false))
                    .filter(users::reactivate_at.le(now)),
            )
            .set((
                users::is_active.eq(true),
                users::reactivate_at.eq(None::<DateTime<Utc>>),
                users::updated_at.eq(now),
            ))
            .returning(users::id)
            .get_results::<i64>(conn)?;
            Ok(ids)
        })
        .await
    }

    async fn store_refresh_token(&self, user_id: i64, token_hash: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        let token_hash = token_hash.to_string();
        self.run(move |conn| {
            diesel::insert_into(refresh_tokens::table)
                .values((
                    refresh_tokens::token_hash.eq(&token_hash),
                    refresh_tokens::user_id.eq(user_id),
                    refresh_tokens::expires_at.eq(expires_at),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn consume_refresh_token(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<i64>> {
        let token_hash = token_hash.to_string();
        self.run(move |conn| {
            let consumed = diesel::delete(refresh_tokens::table.find(&token_hash))
                .returning((refresh_tokens::user_id, refresh_tokens::expires_at))
                .get_result::<(i64, DateTime<Utc>)>(conn)
                .optional()?;
            Ok(consumed.and_then(|(user_id, expires_at)| (expires_at > now).then_some(user_id)))
        })
        .await
    }

    async fn ping(&self) -> AppResult<()> {
        self.run(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }
}
