use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use kindred_core::identity::PhotoUpload;
use kindred_core::models::{Interest, Photo, ProfilePatch, ProfileView};
use kindred_shared::{AppError, AppResult, AuthUser, ErrorCode};

use crate::extract::{ApiJson, ApiPath};
use crate::AppState;

pub async fn get_profile(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.identity.get_profile(user.id).await?))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.identity.update_profile(user.id, patch).await?))
}

/// Multipart fields: `photo` (required), `is_primary`, `caption`.
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Photo>)> {
    let mut bytes = None;
    let mut is_primary = false;
    let mut caption = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("photo") => bytes = Some(field.bytes().await.map_err(multipart_error)?.to_vec()),
            Some("is_primary") => {
                let raw = field.text().await.map_err(multipart_error)?;
                is_primary = match raw.trim() {
                    "true" | "1" => true,
                    "false" | "0" | "" => false,
                    other => {
                        return Err(AppError::new(
                            ErrorCode::ValidationError,
                            format!("is_primary must be true or false, got {other:?}"),
                        ))
                    }
                };
            }
            Some("caption") => caption = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| AppError::new(ErrorCode::InvalidPhoto, "the photo field is required"))?;
    let photo = state
        .identity
        .add_photo(user.id, PhotoUpload { bytes, is_primary, caption })
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(photo_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.identity.delete_photo(user.id, photo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_primary_photo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(photo_id): ApiPath<i64>,
) -> AppResult<Json<Photo>> {
    Ok(Json(state.identity.set_primary_photo(user.id, photo_id).await?))
}

#[derive(Debug, Serialize)]
pub struct InterestCatalog {
    pub interests: Vec<Interest>,
}

pub async fn list_interests(State(state): State<Arc<AppState>>, _user: AuthUser) -> AppResult<Json<InterestCatalog>> {
    let interests = state.identity.interests().await?;
    Ok(Json(InterestCatalog { interests }))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(ErrorCode::PayloadTooLarge, "photo exceeds the upload size limit")
    } else {
        AppError::new(ErrorCode::BadRequest, format!("invalid multipart body: {}", e.body_text()))
    }
}
