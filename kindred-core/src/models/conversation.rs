use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::relation::Match;
use super::user::UserCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::System => "system",
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "system" => Ok(MessageType::System),
            _ => Err(format!("unknown message type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub match_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub match_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub message_type: MessageType,
}

/// Raw per-match chat data as kept by the store.
#[derive(Debug, Clone)]
pub struct ChatRow {
    pub chat: Match,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub match_id: i64,
    pub other_user: UserCard,
    pub last_message: Option<Message>,
    pub unread_count: i64,
    #[serde(skip_serializing)]
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorAdvance {
    pub previous: i64,
    pub current: i64,
}

impl CursorAdvance {
    pub fn moved(&self) -> bool {
        self.current > self.previous
    }
}
