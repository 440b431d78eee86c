//! `/ws` push channel.
//!
//! The bearer token comes from the `Authorization` header or `?token=`, and
//! is checked before the upgrade. Once connected, the socket forwards hub
//! events as `{type, payload}` text frames and accepts `typing.start`,
//! `typing.stop` and `ping` frames from the client.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use kindred_shared::middleware::{extract_bearer_token, AuthState};
use kindred_shared::{AppError, AppResult, ErrorCode};

use crate::extract::ApiQuery;
use crate::AppState;

/// Refreshes the mirrored presence key well inside its TTL.
const PRESENCE_HEARTBEAT: Duration = Duration::from_secs(45);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TypingTarget {
    pub match_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
enum ClientFrame {
    #[serde(rename = "typing.start")]
    TypingStart(TypingTarget),
    #[serde(rename = "typing.stop")]
    TypingStop(TypingTarget),
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
enum ServerFrame {
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerFrame {
    fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload { message: message.into() })
    }
}

pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<WsParams>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let user_id = match authenticate(&state, &headers, params.token.as_deref()).await {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let Some(ws) = ws else {
        return AppError::bad_request("websocket upgrade required").into_response();
    };
    ws.on_upgrade(move |socket| serve(socket, state, user_id))
}

async fn authenticate(state: &AppState, headers: &HeaderMap, query_token: Option<&str>) -> AppResult<i64> {
    let token = match query_token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => token.to_string(),
        None => extract_bearer_token(headers)?,
    };
    let claims = state.tokens().validate(&token)?;
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;
    if !user.is_active {
        return Err(AppError::new(ErrorCode::UserBanned, "account is deactivated"));
    }
    Ok(user.id)
}

async fn serve(socket: WebSocket, state: Arc<AppState>, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();
    let session = match state.presence.connect(user_id).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "push session rejected");
            let _ = sender.send(Message::Text(encode(&ServerFrame::error(e.to_string())))).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let mut heartbeat = tokio::time::interval(PRESENCE_HEARTBEAT);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else {
                    // Closed by the hub: overflow or ban.
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if sender.send(Message::Text(encode(&event))).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                if let Some(reply) = handle_frame(&state, user_id, &text).await {
                    if sender.send(Message::Text(encode(&reply))).await.is_err() {
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => state.presence.heartbeat(user_id).await,
        }
    }

    state.presence.disconnect(&session).await;
}

async fn handle_frame(state: &AppState, user_id: i64, text: &str) -> Option<ServerFrame> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => return Some(ServerFrame::error(format!("unrecognized frame: {e}"))),
    };
    let result = match frame {
        ClientFrame::Ping => return Some(ServerFrame::Pong),
        ClientFrame::TypingStart(target) => state.conversations.typing(user_id, target.match_id, true).await,
        ClientFrame::TypingStop(target) => state.conversations.typing(user_id, target.match_id, false).await,
    };
    result.err().map(|e| ServerFrame::error(e.to_string()))
}

fn encode<T: Serialize>(frame: &T) -> String {
    serde_json::to_string(frame).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode push frame");
        r#"{"type":"error","payload":{"message":"internal error"}}"#.to_string()
    })
}
