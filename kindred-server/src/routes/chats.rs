use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use kindred_core::conversation::{MessagePage, SendMessage};
use kindred_core::models::{ChatSummary, Message};
use kindred_shared::{AppError, AppResult, AuthUser};

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ChatList {
    pub chats: Vec<ChatSummary>,
}

pub async fn list_chats(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<ChatList>> {
    let chats = state.conversations.list_chats(user.id).await?;
    Ok(Json(ChatList { chats }))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(match_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> AppResult<Json<MessagePage>> {
    let page = state
        .conversations
        .get_messages(user.id, match_id, query.before, query.limit)
        .await?;
    Ok(Json(page))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(match_id): ApiPath<i64>,
    ApiJson(body): ApiJson<SendMessage>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = state.conversations.send(user.id, match_id, body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadCursor {
    #[serde(alias = "last_read_message_id")]
    pub up_to: Option<i64>,
}

/// The cursor target may come as `?up_to=` or in an optional JSON body;
/// with neither, everything is marked read.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(match_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ReadCursor>,
    body: Bytes,
) -> AppResult<StatusCode> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        ReadCursor::default()
    } else {
        serde_json::from_slice::<ReadCursor>(&body)
            .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?
    };
    let up_to = query.up_to.or(from_body.up_to);
    state.conversations.mark_read(user.id, match_id, up_to).await?;
    Ok(StatusCode::NO_CONTENT)
}
