//! Distributed exclusive locks with holder tokens and expiry-steal
//! (spec §3, §4.4).

use crate::error::StoreError;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct LockStore {
    pool: PgPool,
}

impl LockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Acquire `lock_name` for `ttl`, returning a holder token that must be
    /// presented to release. On conflict with a live holder, fails; on
    /// conflict with an expired holder, steals it (spec §4.4).
    pub async fn acquire(&self, lock_name: &str, ttl: Duration) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + ttl;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, (String, chrono::DateTime<Utc>)>(
            "SELECT holder_token, expires_at FROM locks WHERE lock_name = $1 FOR UPDATE",
        )
        .bind(lock_name)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO locks (lock_name, holder_token, acquired_at, expires_at) VALUES ($1, $2, now(), $3)",
                )
                .bind(lock_name)
                .bind(&token)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
            }
            Some((_, expiry)) if expiry <= Utc::now() => {
                sqlx::query(
                    "UPDATE locks SET holder_token = $2, acquired_at = now(), expires_at = $3 WHERE lock_name = $1",
                )
                .bind(lock_name)
                .bind(&token)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
            }
            Some(_) => {
                return Err(StoreError::Conflict(format!("{lock_name} is held")));
            }
        }

        tx.commit().await?;
        Ok(token)
    }

    /// Release `lock_name`, succeeding only if `holder_token` matches the
    /// current holder — a stale holder cannot release another's lock.
    pub async fn release(&self, lock_name: &str, holder_token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM locks WHERE lock_name = $1 AND holder_token = $2")
            .bind(lock_name)
            .bind(holder_token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "{lock_name} not held by the given token"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Locking correctness (conflict-vs-steal branching) is exercised against
    // a real Postgres instance in tests/end_to_end_recovery.rs, since the
    // `SELECT ... FOR UPDATE` semantics this relies on have no in-memory
    // substitute worth maintaining here.
}
