use serde::{Deserialize, Serialize};

use crate::models::{Match, Message};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadReceipt {
    pub match_id: i64,
    pub user_id: i64,
    pub last_read_message_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingPayload {
    pub match_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresencePayload {
    pub user_id: i64,
}

/// `user_id` is the member who ended the match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRemovedPayload {
    pub match_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarningPayload {
    pub report_id: i64,
    pub message: String,
}

/// Envelope pushed to live sessions, serialized as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum HubEvent {
    #[serde(rename = "message.created")]
    MessageCreated(Message),
    #[serde(rename = "message.read")]
    MessageRead(ReadReceipt),
    #[serde(rename = "match.created")]
    MatchCreated(Match),
    #[serde(rename = "match.removed")]
    MatchRemoved(MatchRemovedPayload),
    #[serde(rename = "typing.start")]
    TypingStart(TypingPayload),
    #[serde(rename = "typing.stop")]
    TypingStop(TypingPayload),
    #[serde(rename = "presence.online")]
    PresenceOnline(PresencePayload),
    #[serde(rename = "presence.offline")]
    PresenceOffline(PresencePayload),
    #[serde(rename = "account.warning")]
    AccountWarning(WarningPayload),
}

impl HubEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::MessageCreated(_) => "message.created",
            HubEvent::MessageRead(_) => "message.read",
            HubEvent::MatchCreated(_) => "match.created",
            HubEvent::MatchRemoved(_) => "match.removed",
            HubEvent::TypingStart(_) => "typing.start",
            HubEvent::TypingStop(_) => "typing.stop",
            HubEvent::PresenceOnline(_) => "presence.online",
            HubEvent::PresenceOffline(_) => "presence.offline",
            HubEvent::AccountWarning(_) => "account.warning",
        }
    }

    /// Typing and presence events may be shed under back-pressure; the rest
    /// may not.
    pub fn is_critical(&self) -> bool {
        !matches!(
            self,
            HubEvent::TypingStart(_)
                | HubEvent::TypingStop(_)
                | HubEvent::PresenceOnline(_)
                | HubEvent::PresenceOffline(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_type_and_payload() {
        let event = HubEvent::TypingStart(TypingPayload { match_id: 4, user_id: 9 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "typing.start");
        assert_eq!(json["payload"]["match_id"], 4);
        assert_eq!(json["payload"]["user_id"], 9);
    }

    #[test]
    fn only_ephemeral_events_are_sheddable() {
        assert!(!HubEvent::PresenceOnline(PresencePayload { user_id: 1 }).is_critical());
        assert!(HubEvent::MessageRead(ReadReceipt {
            match_id: 1,
            user_id: 2,
            last_read_message_id: 3,
        })
        .is_critical());
    }
}
