use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use kindred_core::identity::RegisterInput;
use kindred_shared::{AppResult, TokenPair, UserRole};

use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: i64,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RegisterInput>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state.identity.register(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "註冊成功",
            user_id: user.id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: LoginUser,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let outcome = state.identity.login(&body.email, &body.password).await?;
    Ok(Json(LoginResponse {
        tokens: outcome.tokens,
        user: LoginUser {
            id: outcome.user.id,
            email: outcome.user.email,
            display_name: outcome.user.display_name,
            role: outcome.user.role,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let tokens = state.identity.refresh(&body.refresh_token).await?;
    Ok(Json(tokens))
}
