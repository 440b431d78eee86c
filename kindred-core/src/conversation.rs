//! Per-match message logs, read cursors and typing indicators.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};

use kindred_shared::types::pagination::clamp_limit;
use kindred_shared::{AppError, AppResult, ErrorCode};

use crate::clock::Clock;
use crate::hub::{HubEvent, PushHub, ReadReceipt};
use crate::matching::haversine_km;
use crate::models::{ChatSummary, CursorAdvance, Match, Message, MessageType, NewMessage, UserCard};
use crate::store::{PersistHook, Store};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_MESSAGE_CHARS: usize = 1000;

fn default_message_type() -> MessageType {
    MessageType::Text
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: MessageType,
}

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

pub struct ConversationService {
    store: Arc<dyn Store>,
    hub: Arc<PushHub>,
    clock: Arc<dyn Clock>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn Store>, hub: Arc<PushHub>, clock: Arc<dyn Clock>) -> Self {
        Self { store, hub, clock }
    }

    /// Chats with active counterparts and no block in either direction,
    /// most recently active first.
    pub async fn list_chats(&self, user_id: i64) -> AppResult<Vec<ChatSummary>> {
        let viewer = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?;
        let blocked = self.store.blocked_peers(user_id).await?;
        let rows: Vec<_> = self
            .store
            .chat_rows(user_id)
            .await?
            .into_iter()
            .filter(|row| !blocked.contains(&row.chat.other(user_id)))
            .collect();

        let peer_ids: Vec<i64> = rows.iter().map(|row| row.chat.other(user_id)).collect();
        let peers = self.store.find_users(&peer_ids).await?;
        let mut photos = self.store.photos_for(&peer_ids).await?;
        let today = self.clock.today();

        let mut chats: Vec<ChatSummary> = rows
            .into_iter()
            .filter_map(|row| {
                let peer = peers
                    .iter()
                    .find(|u| u.id == row.chat.other(user_id) && u.is_active)?;
                let distance = match (viewer.location, peer.location) {
                    (Some(a), Some(b)) => Some((haversine_km(a, b) * 10.0).round() / 10.0),
                    _ => None,
                };
                let last_activity = row
                    .last_message
                    .as_ref()
                    .map_or(row.chat.created_at, |m| m.created_at.max(row.chat.created_at));
                Some(ChatSummary {
                    match_id: row.chat.id,
                    other_user: UserCard::new(peer, photos.remove(&peer.id).unwrap_or_default(), today, distance),
                    last_message: row.last_message,
                    unread_count: row.unread_count,
                    last_activity,
                })
            })
            .collect();

        chats.sort_by(|a, b| b.last_activity.cmp(&a.last_activity).then(b.match_id.cmp(&a.match_id)));
        Ok(chats)
    }

    /// Newest first; `before` is an exclusive message id cursor.
    pub async fn get_messages(
        &self,
        user_id: i64,
        match_id: i64,
        before: Option<i64>,
        limit: Option<i64>,
    ) -> AppResult<MessagePage> {
        self.member_match(user_id, match_id).await?;
        let limit = clamp_limit(limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let mut messages = self.store.list_messages(match_id, before, limit + 1).await?;
        let has_more = messages.len() as i64 > limit;
        messages.truncate(limit as usize);
        Ok(MessagePage { messages, has_more })
    }

    pub async fn send(&self, user_id: i64, match_id: i64, input: SendMessage) -> AppResult<Message> {
        if input.message_type == MessageType::System {
            return Err(AppError::new(ErrorCode::InvalidMessage, "system messages cannot be sent by users"));
        }
        let length = input.content.chars().count();
        if length == 0 || length > MAX_MESSAGE_CHARS {
            return Err(AppError::new(
                ErrorCode::InvalidMessage,
                format!("message content must be 1 to {MAX_MESSAGE_CHARS} characters"),
            ));
        }

        let chat = self.member_match(user_id, match_id).await?;
        let hub = self.hub.clone();
        let participants = [chat.user_a, chat.user_b];
        let on_persist: PersistHook = Arc::new(move |message: &Message| {
            hub.publish(&participants, HubEvent::MessageCreated(message.clone()));
        });

        let message = self
            .store
            .append_message(
                NewMessage {
                    match_id,
                    sender_id: user_id,
                    content: input.content,
                    message_type: input.message_type,
                },
                self.clock.now(),
                on_persist,
            )
            .await?;

        counter!("messages_total").increment(1);
        tracing::info!(user_id, match_id, message_id = message.id, "message sent");
        Ok(message)
    }

    /// Advances the caller's read cursor, up to the newest message when
    /// `up_to` is absent. The counterpart hears about it only when it moved.
    pub async fn mark_read(&self, user_id: i64, match_id: i64, up_to: Option<i64>) -> AppResult<CursorAdvance> {
        if up_to.is_some_and(|id| id < 0) {
            return Err(AppError::new(ErrorCode::ValidationError, "message id must not be negative"));
        }
        let chat = self.member_match(user_id, match_id).await?;
        let advance = self.store.advance_read_cursor(match_id, user_id, up_to).await?;
        if advance.moved() {
            self.hub.publish(
                &[chat.other(user_id)],
                HubEvent::MessageRead(ReadReceipt {
                    match_id,
                    user_id,
                    last_read_message_id: advance.current,
                }),
            );
            tracing::debug!(user_id, match_id, up_to = advance.current, "read cursor advanced");
        }
        Ok(advance)
    }

    pub async fn typing(&self, user_id: i64, match_id: i64, started: bool) -> AppResult<()> {
        let chat = self.member_match(user_id, match_id).await?;
        let other = chat.other(user_id);
        if self.store.blocked_peers(user_id).await?.contains(&other) {
            return Err(AppError::new(ErrorCode::ChatBlocked, "this conversation is blocked"));
        }
        if started {
            self.hub.typing_start(match_id, user_id, other);
        } else {
            self.hub.typing_stop(match_id, user_id, other);
        }
        Ok(())
    }

    async fn member_match(&self, user_id: i64, match_id: i64) -> AppResult<Match> {
        let chat = self
            .store
            .find_match(match_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))?;
        if !chat.involves(user_id) {
            return Err(AppError::new(ErrorCode::NotMatchMember, "you are not part of this match"));
        }
        Ok(chat)
    }
}
