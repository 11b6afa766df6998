//! # Postgres thread repository
//!
//! Maps the `threads`/`replies` tables to domain models. The follower set is
//! a `uuid[]` column changed only by guarded `array_append`/`array_remove`
//! updates, and the reply count by a clamped relative update, so neither is
//! read back and rewritten by the application.

use std::collections::BTreeSet;
use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{DomainError, LastReply, Reply, Result, Thread, ThreadRepo};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

fn unavailable(e: impl Display) -> DomainError {
    DomainError::StoreUnavailable(e.to_string())
}

fn persist(e: impl Display) -> DomainError {
    DomainError::PersistError(e.to_string())
}

fn missing(thread_id: Uuid) -> DomainError {
    DomainError::NotFound("Thread".to_string(), thread_id.to_string())
}

pub struct PgThreadRepo {
    pool: PgPool,
}

impl PgThreadRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(unavailable)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(persist)
    }

    /// Creates the thread row. Thread content lives elsewhere; this is the
    /// engagement view of it.
    pub async fn insert_thread(&self, thread: &Thread) -> Result<()> {
        let pointer = thread.last_reply.as_ref();
        let followers: Vec<Uuid> = thread.follower_ids.iter().copied().collect();
        sqlx::query(
            "INSERT INTO threads (id, author_id, created_at, replies_count, last_reply_id, \
             last_reply_user_id, last_reply_user_login, replied_at, last_active_mark, follower_ids) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(thread.id)
        .bind(thread.author_id)
        .bind(thread.created_at)
        .bind(i32::try_from(thread.replies_count).map_err(persist)?)
        .bind(pointer.map(|p| p.reply_id))
        .bind(pointer.map(|p| p.user_id))
        .bind(pointer.and_then(|p| p.user_login.clone()))
        .bind(pointer.map(|p| p.replied_at))
        .bind(thread.last_active_mark)
        .bind(followers)
        .execute(&self.pool)
        .await
        .map_err(persist)?;
        Ok(())
    }
}

fn thread_from_row(row: &PgRow) -> Result<Thread> {
    let last_reply = LastReply::from_columns(
        row.try_get("last_reply_id").map_err(unavailable)?,
        row.try_get("last_reply_user_id").map_err(unavailable)?,
        row.try_get("last_reply_user_login").map_err(unavailable)?,
        row.try_get("replied_at").map_err(unavailable)?,
    )?;
    let replies_count: i32 = row.try_get("replies_count").map_err(unavailable)?;
    let follower_ids: Vec<Uuid> = row.try_get("follower_ids").map_err(unavailable)?;

    Ok(Thread {
        id: row.try_get("id").map_err(unavailable)?,
        author_id: row.try_get("author_id").map_err(unavailable)?,
        created_at: row.try_get("created_at").map_err(unavailable)?,
        replies_count: u32::try_from(replies_count)
            .map_err(|_| DomainError::InvalidState(format!("negative replies_count {replies_count}")))?,
        last_reply,
        last_active_mark: row.try_get("last_active_mark").map_err(unavailable)?,
        follower_ids: follower_ids.into_iter().collect::<BTreeSet<_>>(),
    })
}

fn reply_from_row(row: &PgRow) -> Result<Reply> {
    Ok(Reply {
        id: row.try_get("id").map_err(unavailable)?,
        thread_id: row.try_get("thread_id").map_err(unavailable)?,
        author_id: row.try_get("author_id").map_err(unavailable)?,
        author_login: row.try_get("author_login").map_err(unavailable)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(unavailable)?,
    })
}

#[async_trait]
impl ThreadRepo for PgThreadRepo {
    async fn load(&self, thread_id: Uuid) -> Result<Option<Thread>> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = $1")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn save(&self, thread: &Thread) -> Result<()> {
        let pointer = thread.last_reply.as_ref();
        let done = sqlx::query(
            "UPDATE threads SET last_reply_id = $2, last_reply_user_id = $3, \
             last_reply_user_login = $4, replied_at = $5, \
             last_active_mark = GREATEST(last_active_mark, $6) \
             WHERE id = $1",
        )
        .bind(thread.id)
        .bind(pointer.map(|p| p.reply_id))
        .bind(pointer.map(|p| p.user_id))
        .bind(pointer.and_then(|p| p.user_login.clone()))
        .bind(pointer.map(|p| p.replied_at))
        .bind(thread.last_active_mark)
        .execute(&self.pool)
        .await
        .map_err(persist)?;

        if done.rows_affected() == 0 {
            return Err(persist(format!("thread {} does not exist", thread.id)));
        }
        debug!(thread_id = %thread.id, "thread saved");
        Ok(())
    }

    async fn recent_replies_excluding(
        &self,
        thread_id: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Reply>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, thread_id, author_id, author_login, created_at FROM replies \
             WHERE thread_id = $1 AND deleted_at IS NULL AND NOT (id = ANY($2)) \
             ORDER BY created_at DESC, id DESC LIMIT $3",
        )
        .bind(thread_id)
        .bind(excluded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter().map(reply_from_row).collect()
    }

    async fn add_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE threads SET follower_ids = array_append(follower_ids, $2) \
             WHERE id = $1 AND author_id <> $2 AND NOT ($2 = ANY(follower_ids))",
        )
        .bind(thread_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(persist)?;
        Ok(done.rows_affected() == 1)
    }

    async fn remove_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE threads SET follower_ids = array_remove(follower_ids, $2) \
             WHERE id = $1 AND $2 = ANY(follower_ids)",
        )
        .bind(thread_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(persist)?;
        Ok(done.rows_affected() == 1)
    }

    async fn adjust_replies_count(&self, thread_id: Uuid, delta: i32) -> Result<u32> {
        let row = sqlx::query(
            "UPDATE threads SET replies_count = GREATEST(replies_count + $2, 0) \
             WHERE id = $1 RETURNING replies_count",
        )
        .bind(thread_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(persist)?
        .ok_or_else(|| missing(thread_id))?;

        let count: i32 = row.try_get("replies_count").map_err(unavailable)?;
        Ok(count.max(0) as u32)
    }
}
