//! # Redis adapter
//!
//! Counter buckets are Redis hashes mutated with `HINCRBY`, which is atomic
//! per field. Ranking sets are sorted sets replaced inside a `MULTI`/`EXEC`
//! block so readers never observe a half-written ranking.

use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use deadpool_redis::{redis, Config, Connection, Pool, PoolConfig, Runtime};
use domains::{CounterStore, DomainError, RankedThread, RankingStore, Result};
use tracing::warn;
use uuid::Uuid;

fn unavailable(e: impl Display) -> DomainError {
    DomainError::StoreUnavailable(e.to_string())
}

/// Inclusive `ZREVRANGE` stop for a non-empty page; `-1` reads to the end
/// when the page runs past what an index can express.
fn ranking_stop(offset: usize, limit: usize) -> i64 {
    offset
        .checked_add(limit.saturating_sub(1))
        .and_then(|stop| i64::try_from(stop).ok())
        .unwrap_or(-1)
}

/// Counter and ranking store on a shared connection pool.
#[derive(Clone)]
pub struct RedisEngagementStore {
    pool: Pool,
}

impl RedisEngagementStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds the pool. Connections are opened lazily on first use.
    pub fn connect(url: &str, max_size: usize) -> Result<Self> {
        let mut cfg = Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(max_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| unavailable(format!("redis pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Round-trips a `PING`, used at startup to fail fast.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(unavailable)
    }
}

#[async_trait]
impl CounterStore for RedisEngagementStore {
    async fn increment(&self, bucket: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        redis::cmd("HINCRBY")
            .arg(bucket)
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn decrement(&self, bucket: &str, field: &str, delta: i64) -> Result<i64> {
        self.increment(bucket, field, -delta).await
    }

    async fn read_all(&self, bucket: &str) -> Result<HashMap<String, i64>> {
        let mut conn = self.conn().await?;
        redis::cmd("HGETALL")
            .arg(bucket)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn remove(&self, bucket: &str, field: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = redis::cmd("HDEL")
            .arg(bucket)
            .arg(field)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl RankingStore for RedisEngagementStore {
    async fn replace_ranking(&self, key: &str, entries: &[RankedThread]) -> Result<()> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(key).ignore();
        if !entries.is_empty() {
            let members: Vec<(i64, String)> = entries
                .iter()
                .map(|e| (e.score, e.thread_id.to_string()))
                .collect();
            pipe.cmd("ZADD").arg(key).arg(&members).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(unavailable)?;
        Ok(())
    }

    async fn read_ranking(&self, key: &str, offset: usize, limit: usize) -> Result<Vec<RankedThread>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let stop = ranking_stop(offset, limit);
        let raw: Vec<(String, f64)> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(offset)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(raw
            .into_iter()
            .filter_map(|(member, score)| match Uuid::parse_str(&member) {
                Ok(thread_id) => Some(RankedThread {
                    thread_id,
                    score: score.round() as i64,
                }),
                Err(_) => {
                    warn!(%key, %member, "skipping malformed ranking member");
                    None
                }
            })
            .collect())
    }
}
