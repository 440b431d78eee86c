//! Postgres store on diesel. Each trait method runs on the blocking pool and
//! wraps its reads and writes in one transaction where atomicity matters.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::BigInt;

use kindred_shared::clients::db::DbPool;
use kindred_shared::{AppError, AppResult};

use crate::models::canonical_pair;

mod conversation;
mod identity;
mod moderation;
mod relations;
mod rows;
pub mod schema;

/// Advisory lock namespaces, one per pair-scoped workflow.
const LOCK_LIKE: i64 = 1;
const LOCK_BLOCK: i64 = 2;
const LOCK_REPORT: i64 = 3;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| AppError::internal(format!("db pool error: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::internal(format!("db task failed: {e}")))?
    }
}

fn pair_lock_key(namespace: i64, a: i64, b: i64) -> i64 {
    let (lo, hi) = canonical_pair(a, b);
    namespace
        .wrapping_mul(0x9E37_79B9_7F4A_7C15_u64 as i64)
        ^ lo.wrapping_mul(0x0000_0100_0000_01B3)
        ^ hi.rotate_left(32)
}

/// Transaction-scoped lock on an unordered user pair.
fn lock_pair(conn: &mut PgConnection, namespace: i64, a: i64, b: i64) -> AppResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(pair_lock_key(namespace, a, b))
        .execute(conn)?;
    Ok(())
}
