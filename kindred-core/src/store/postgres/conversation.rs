use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{max, sql};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::BigInt;

use kindred_shared::{AppError, AppResult, ErrorCode};

use super::relations::blocked_between;
use super::rows::{MatchRow, MessageRow, NewMessageRow};
use super::schema::{matches, messages, read_cursors, users};
use super::PgStore;
use crate::models::{ChatRow, CursorAdvance, Match, Message, NewMessage};
use crate::store::{ConversationStore, PersistHook};

fn last_read(conn: &mut PgConnection, match_id: i64, user_id: i64) -> QueryResult<i64> {
    Ok(read_cursors::table
        .find((match_id, user_id))
        .select(read_cursors::last_read_message_id)
        .first::<i64>(conn)
        .optional()?
        .unwrap_or(0))
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn append_message(
        &self,
        message: NewMessage,
        now: DateTime<Utc>,
        on_persist: PersistHook,
    ) -> AppResult<Message> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let chat: Match = matches::table
                    .find(message.match_id)
                    .filter(matches::unmatched_at.is_null())
                    .for_update()
                    .first::<MatchRow>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))?
                    .into();
                if !chat.involves(message.sender_id) {
                    return Err(AppError::new(ErrorCode::NotMatchMember, "you are not part of this match"));
                }
                let other = chat.other(message.sender_id);
                if blocked_between(conn, message.sender_id, other)? {
                    return Err(AppError::new(ErrorCode::ChatBlocked, "this conversation is blocked"));
                }

                let activity: Vec<(i64, bool)> = users::table
                    .filter(users::id.eq_any(vec![message.sender_id, other]))
                    .select((users::id, users::is_active))
                    .load(conn)?;
                let is_active = |id: i64| activity.iter().any(|(uid, active)| *uid == id && *active);
                if !is_active(message.sender_id) {
                    return Err(AppError::new(ErrorCode::UserBanned, "your account is deactivated"));
                }
                if !is_active(other) {
                    return Err(AppError::new(ErrorCode::TargetUnavailable, "this user is unavailable"));
                }

                let latest: Option<DateTime<Utc>> = messages::table
                    .filter(messages::match_id.eq(chat.id))
                    .select(max(messages::created_at))
                    .first(conn)?;
                let created_at = latest.map_or(now, |last| last.max(now));

                let stored = diesel::insert_into(messages::table)
                    .values(NewMessageRow::new(&message, created_at))
                    .get_result::<MessageRow>(conn)?
                    .into_domain()?;
                on_persist(&stored);
                Ok(stored)
            })
        })
        .await
    }

    async fn list_messages(&self, match_id: i64, before: Option<i64>, limit: i64) -> AppResult<Vec<Message>> {
        self.run(move |conn| {
            let mut query = messages::table
                .filter(messages::match_id.eq(match_id))
                .into_boxed();
            if let Some(before) = before {
                query = query.filter(messages::id.lt(before));
            }
            query
                .order(messages::id.desc())
                .limit(limit)
                .load::<MessageRow>(conn)?
                .into_iter()
                .map(MessageRow::into_domain)
                .collect()
        })
        .await
    }

    async fn chat_rows(&self, user_id: i64) -> AppResult<Vec<ChatRow>> {
        self.run(move |conn| {
            let chats = matches::table
                .filter(matches::user_a.eq(user_id).or(matches::user_b.eq(user_id)))
                .filter(matches::unmatched_at.is_null())
                .load::<MatchRow>(conn)?;

            let mut rows = Vec::with_capacity(chats.len());
            for chat in chats {
                let last_message = messages::table
                    .filter(messages::match_id.eq(chat.id))
                    .order(messages::id.desc())
                    .first::<MessageRow>(conn)
                    .optional()?
                    .map(MessageRow::into_domain)
                    .transpose()?;

                let cursor = last_read(conn, chat.id, user_id)?;
                let unread_count: i64 = messages::table
                    .filter(messages::match_id.eq(chat.id))
                    .filter(messages::id.gt(cursor))
                    .filter(messages::sender_id.ne(user_id))
                    .count()
                    .get_result(conn)?;

                rows.push(ChatRow {
                    chat: chat.into(),
                    last_message,
                    unread_count,
                });
            }
            Ok(rows)
        })
        .await
    }

    async fn advance_read_cursor(&self, match_id: i64, user_id: i64, up_to: Option<i64>) -> AppResult<CursorAdvance> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let newest: Option<i64> = messages::table
                    .filter(messages::match_id.eq(match_id))
                    .select(max(messages::id))
                    .first(conn)?;
                let newest = newest.unwrap_or(0);
                let target = up_to.map_or(newest, |id| id.min(newest));

                let previous = last_read(conn, match_id, user_id)?;
                let current = diesel::insert_into(read_cursors::table)
                    .values((
                        read_cursors::match_id.eq(match_id),
                        read_cursors::user_id.eq(user_id),
                        read_cursors::last_read_message_id.eq(target.max(0)),
                    ))
                    .on_conflict((read_cursors::match_id, read_cursors::user_id))
                    .do_update()
                    .set(read_cursors::last_read_message_id.eq(sql::<BigInt>(
                        "GREATEST(read_cursors.last_read_message_id, excluded.last_read_message_id)",
                    )))
                    .returning(read_cursors::last_read_message_id)
                    .get_result::<i64>(conn)?;

                Ok(CursorAdvance { previous, current })
            })
        })
        .await
    }
}
