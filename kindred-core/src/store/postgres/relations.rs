use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{exists, not};
use diesel::pg::PgConnection;
use diesel::prelude::*;

use kindred_shared::{AppError, AppResult, ErrorCode};

use super::rows::{users_into_domain, BlockRow, MatchRow, NewBlockRow, NewLikeRow, NewMatchRow, NewPassRow, UserRow};
use super::schema::{blocks, likes, matches, passes, users};
use super::{lock_pair, PgStore, LOCK_BLOCK, LOCK_LIKE};
use crate::models::{canonical_pair, Block, LikeOutcome, Match, NewBlock, User};
use crate::store::{CandidateFilter, RelationStore};

pub(super) fn blocked_between(conn: &mut PgConnection, a: i64, b: i64) -> QueryResult<bool> {
    diesel::select(exists(
        blocks::table.filter(
            blocks::blocker_id
                .eq(a)
                .and(blocks::blocked_id.eq(b))
                .or(blocks::blocker_id.eq(b).and(blocks::blocked_id.eq(a))),
        ),
    ))
    .get_result(conn)
}

fn excluded_for(conn: &mut PgConnection, viewer: i64) -> QueryResult<Vec<i64>> {
    let mut excluded: Vec<i64> = likes::table
        .filter(likes::from_user.eq(viewer))
        .select(likes::to_user)
        .load(conn)?;
    excluded.extend(
        passes::table
            .filter(passes::from_user.eq(viewer))
            .select(passes::to_user)
            .load::<i64>(conn)?,
    );
    excluded.extend(
        blocks::table
            .filter(blocks::blocker_id.eq(viewer))
            .select(blocks::blocked_id)
            .load::<i64>(conn)?,
    );
    excluded.extend(
        blocks::table
            .filter(blocks::blocked_id.eq(viewer))
            .select(blocks::blocker_id)
            .load::<i64>(conn)?,
    );
    let pairs: Vec<(i64, i64)> = matches::table
        .filter(matches::user_a.eq(viewer).or(matches::user_b.eq(viewer)))
        .select((matches::user_a, matches::user_b))
        .load(conn)?;
    excluded.extend(pairs.into_iter().map(|(a, b)| if a == viewer { b } else { a }));
    excluded.push(viewer);
    excluded.sort_unstable();
    excluded.dedup();
    Ok(excluded)
}

#[async_trait]
impl RelationStore for PgStore {
    async fn candidate_pool(&self, viewer: i64, filter: &CandidateFilter) -> AppResult<Vec<User>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let excluded = excluded_for(conn, viewer)?;
            let mut query = users::table
                .filter(users::is_active.eq(true))
                .filter(not(users::id.eq_any(excluded)))
                .filter(users::birth_date.between(filter.born_from, filter.born_to))
                .into_boxed();

            if let Some(bounds) = filter.bounds {
                query = query.filter(users::latitude.between(bounds.min_lat, bounds.max_lat));
                query = match bounds.lon {
                    Some((min, max)) => query.filter(users::longitude.between(min, max)),
                    None => query.filter(users::longitude.is_not_null()),
                };
            }

            let rows = query.order(users::id.asc()).load::<UserRow>(conn)?;
            users_into_domain(rows)
        })
        .await
    }

    async fn record_like(&self, from: i64, to: i64, now: DateTime<Utc>) -> AppResult<LikeOutcome> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let target_active = users::table
                    .find(to)
                    .select(users::is_active)
                    .first::<bool>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::new(ErrorCode::TargetNotFound, "target user does not exist"))?;

                // Serializes concurrent likes across the pair before the reverse like is inspected.
                lock_pair(conn, LOCK_LIKE, from, to)?;

                if !target_active || blocked_between(conn, from, to)? {
                    return Err(AppError::new(ErrorCode::TargetUnavailable, "target user is unavailable"));
                }

                let inserted = diesel::insert_into(likes::table)
                    .values(NewLikeRow {
                        from_user: from,
                        to_user: to,
                        created_at: now,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;
                if inserted == 0 {
                    return Err(AppError::new(ErrorCode::AlreadyLiked, "you already liked this user"));
                }

                let reverse: bool = diesel::select(exists(
                    likes::table
                        .filter(likes::from_user.eq(to))
                        .filter(likes::to_user.eq(from)),
                ))
                .get_result(conn)?;
                if !reverse {
                    return Ok(LikeOutcome::Liked);
                }

                let (user_a, user_b) = canonical_pair(from, to);
                let created = diesel::insert_into(matches::table)
                    .values(NewMatchRow {
                        user_a,
                        user_b,
                        created_at: now,
                    })
                    .on_conflict((matches::user_a, matches::user_b))
                    .do_nothing()
                    .get_result::<MatchRow>(conn)
                    .optional()?;

                Ok(match created {
                    Some(row) => LikeOutcome::Matched(row.into()),
                    None => LikeOutcome::Liked,
                })
            })
        })
        .await
    }

    async fn record_pass(&self, from: i64, to: i64, now: DateTime<Utc>) -> AppResult<()> {
        self.run(move |conn| {
            let known: bool = diesel::select(exists(users::table.find(to))).get_result(conn)?;
            if !known {
                return Err(AppError::new(ErrorCode::TargetNotFound, "target user does not exist"));
            }
            diesel::insert_into(passes::table)
                .values(NewPassRow {
                    from_user: from,
                    to_user: to,
                    created_at: now,
                })
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_match(&self, id: i64) -> AppResult<Option<Match>> {
        self.run(move |conn| {
            Ok(matches::table
                .find(id)
                .filter(matches::unmatched_at.is_null())
                .first::<MatchRow>(conn)
                .optional()?
                .map(Match::from))
        })
        .await
    }

    async fn matches_for(&self, user_id: i64) -> AppResult<Vec<Match>> {
        self.run(move |conn| {
            let rows = matches::table
                .filter(matches::user_a.eq(user_id).or(matches::user_b.eq(user_id)))
                .filter(matches::unmatched_at.is_null())
                .order(matches::id.asc())
                .load::<MatchRow>(conn)?;
            Ok(rows.into_iter().map(Match::from).collect())
        })
        .await
    }

    async fn end_match(&self, match_id: i64, user_id: i64, now: DateTime<Utc>) -> AppResult<Match> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                // Row lock orders this after any in-flight append on the match.
                let live: Match = matches::table
                    .find(match_id)
                    .filter(matches::unmatched_at.is_null())
                    .for_update()
                    .first::<MatchRow>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))?
                    .into();
                if !live.involves(user_id) {
                    return Err(AppError::new(ErrorCode::NotMatchMember, "you are not part of this match"));
                }
                diesel::update(matches::table.find(match_id))
                    .set(matches::unmatched_at.eq(Some(now)))
                    .execute(conn)?;
                Ok(live)
            })
        })
        .await
    }

    async fn blocked_peers(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        self.run(move |conn| {
            let pairs: Vec<(i64, i64)> = blocks::table
                .filter(blocks::blocker_id.eq(user_id).or(blocks::blocked_id.eq(user_id)))
                .select((blocks::blocker_id, blocks::blocked_id))
                .load(conn)?;
            Ok(pairs
                .into_iter()
                .map(|(blocker, blocked)| if blocker == user_id { blocked } else { blocker })
                .collect())
        })
        .await
    }

    async fn create_block(&self, block: NewBlock) -> AppResult<Block> {
        self.run(move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let known: bool = diesel::select(exists(users::table.find(block.blocked_id))).get_result(conn)?;
                if !known {
                    return Err(AppError::new(ErrorCode::TargetNotFound, "user to block does not exist"));
                }

                lock_pair(conn, LOCK_BLOCK, block.blocker_id, block.blocked_id)?;
                // Waits out any send holding the shared match.
                let (user_a, user_b) = canonical_pair(block.blocker_id, block.blocked_id);
                matches::table
                    .filter(matches::user_a.eq(user_a))
                    .filter(matches::user_b.eq(user_b))
                    .select(matches::id)
                    .for_update()
                    .first::<i64>(conn)
                    .optional()?;

                let inserted = diesel::insert_into(blocks::table)
                    .values(NewBlockRow::from(&block))
                    .on_conflict((blocks::blocker_id, blocks::blocked_id))
                    .do_nothing()
                    .get_result::<BlockRow>(conn)
                    .optional()?;

                let row = match inserted {
                    Some(row) => row,
                    None => blocks::table
                        .filter(blocks::blocker_id.eq(block.blocker_id))
                        .filter(blocks::blocked_id.eq(block.blocked_id))
                        .first::<BlockRow>(conn)?,
                };
                row.into_domain()
            })
        })
        .await
    }

    async fn list_blocks(&self, blocker_id: i64) -> AppResult<Vec<Block>> {
        self.run(move |conn| {
            blocks::table
                .filter(blocks::blocker_id.eq(blocker_id))
                .order((blocks::created_at.desc(), blocks::id.desc()))
                .load::<BlockRow>(conn)?
                .into_iter()
                .map(BlockRow::into_domain)
                .collect()
        })
        .await
    }

    async fn find_block(&self, id: i64) -> AppResult<Option<Block>> {
        self.run(move |conn| {
            blocks::table
                .find(id)
                .first::<BlockRow>(conn)
                .optional()?
                .map(BlockRow::into_domain)
                .transpose()
        })
        .await
    }

    async fn delete_block(&self, id: i64) -> AppResult<()> {
        self.run(move |conn| {
            diesel::delete(blocks::table.find(id)).execute(conn)?;
            Ok(())
        })
        .await
    }
}
