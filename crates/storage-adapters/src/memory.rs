//! # In-memory adapters
//!
//! Process-local implementations of the ports, used by tests and single-node
//! development setups. Per-key atomicity comes from `DashMap` shard locks:
//! every mutation happens inside one `entry`/`get_mut` guard, so there is no
//! read-modify-write window between callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    CounterStore, DomainError, RankedThread, RankingStore, Reply, Result, Thread, ThreadRepo,
};
use tracing::debug;
use uuid::Uuid;

/// Counter buckets and ranking sets, mirroring the Redis layout.
#[derive(Debug)]
pub struct MemoryEngagementStore {
    buckets: DashMap<String, HashMap<String, i64>>,
    rankings: DashMap<String, Vec<RankedThread>>,
    available: AtomicBool,
}

impl Default for MemoryEngagementStore {
    fn default() -> Self {
        Self {
            buckets: DashMap::new(),
            rankings: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryEngagementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current value of one counter, zero when missing.
    pub fn value(&self, bucket: &str, field: &str) -> i64 {
        self.buckets
            .get(bucket)
            .and_then(|b| b.get(field).copied())
            .unwrap_or(0)
    }

    /// Overwrites one counter. Test seeding only.
    pub fn set_value(&self, bucket: &str, field: &str, value: i64) {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DomainError::StoreUnavailable("memory store offline".to_string()))
        }
    }
}

#[async_trait]
impl CounterStore for MemoryEngagementStore {
    async fn increment(&self, bucket: &str, field: &str, delta: i64) -> Result<i64> {
        self.check()?;
        let mut entry = self.buckets.entry(bucket.to_string()).or_default();
        let value = entry.entry(field.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn decrement(&self, bucket: &str, field: &str, delta: i64) -> Result<i64> {
        self.increment(bucket, field, -delta).await
    }

    async fn read_all(&self, bucket: &str) -> Result<HashMap<String, i64>> {
        self.check()?;
        Ok(self.buckets.get(bucket).map(|b| b.clone()).unwrap_or_default())
    }

    async fn remove(&self, bucket: &str, field: &str) -> Result<()> {
        self.check()?;
        if let Some(mut b) = self.buckets.get_mut(bucket) {
            b.remove(field);
        }
        Ok(())
    }
}

#[async_trait]
impl RankingStore for MemoryEngagementStore {
    async fn replace_ranking(&self, key: &str, entries: &[RankedThread]) -> Result<()> {
        self.check()?;
        if entries.is_empty() {
            self.rankings.remove(key);
            return Ok(());
        }
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| b.score.cmp(&a.score).then(a.thread_id.cmp(&b.thread_id)));
        self.rankings.insert(key.to_string(), sorted);
        Ok(())
    }

    async fn read_ranking(&self, key: &str, offset: usize, limit: usize) -> Result<Vec<RankedThread>> {
        self.check()?;
        Ok(self
            .rankings
            .get(key)
            .map(|r| r.iter().skip(offset).take(limit).copied().collect())
            .unwrap_or_default())
    }
}

/// Threads and their replies.
#[derive(Debug)]
pub struct MemoryThreadRepo {
    threads: DashMap<Uuid, Thread>,
    replies: DashMap<Uuid, Vec<Reply>>,
    fail_saves: AtomicBool,
}

impl Default for MemoryThreadRepo {
    fn default() -> Self {
        Self {
            threads: DashMap::new(),
            replies: DashMap::new(),
            fail_saves: AtomicBool::new(false),
        }
    }
}

impl MemoryThreadRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_thread(&self, thread: Thread) {
        self.threads.insert(thread.id, thread);
    }

    pub fn insert_reply(&self, reply: Reply) {
        self.replies.entry(reply.thread_id).or_default().push(reply);
    }

    /// Removes a reply the way the external reply store would on deletion.
    pub fn remove_reply(&self, thread_id: Uuid, reply_id: Uuid) -> Option<Reply> {
        let mut replies = self.replies.get_mut(&thread_id)?;
        let index = replies.iter().position(|r| r.id == reply_id)?;
        Some(replies.remove(index))
    }

    /// Snapshot of a stored thread.
    pub fn get(&self, thread_id: Uuid) -> Option<Thread> {
        self.threads.get(&thread_id).map(|t| t.clone())
    }

    /// Makes `save` fail with `PersistError` until switched back.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn missing(thread_id: Uuid) -> DomainError {
        DomainError::NotFound("Thread".to_string(), thread_id.to_string())
    }
}

#[async_trait]
impl ThreadRepo for MemoryThreadRepo {
    async fn load(&self, thread_id: Uuid) -> Result<Option<Thread>> {
        Ok(self.get(thread_id))
    }

    async fn save(&self, thread: &Thread) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DomainError::PersistError("memory repo rejecting writes".to_string()));
        }
        let mut stored = self
            .threads
            .get_mut(&thread.id)
            .ok_or_else(|| DomainError::PersistError(format!("thread {} does not exist", thread.id)))?;
        stored.last_reply = thread.last_reply.clone();
        stored.last_active_mark = thread.last_active_mark;
        debug!(thread_id = %thread.id, "thread saved");
        Ok(())
    }

    async fn recent_replies_excluding(
        &self,
        thread_id: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Reply>> {
        let Some(replies) = self.replies.get(&thread_id) else {
            return Ok(Vec::new());
        };
        let mut remaining: Vec<Reply> = replies
            .iter()
            .filter(|r| !excluded.contains(&r.id))
            .cloned()
            .collect();
        remaining.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        remaining.truncate(limit);
        Ok(remaining)
    }

    async fn add_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut thread = self.threads.get_mut(&thread_id).ok_or_else(|| Self::missing(thread_id))?;
        Ok(thread.insert_follower(user_id))
    }

    async fn remove_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut thread = self.threads.get_mut(&thread_id).ok_or_else(|| Self::missing(thread_id))?;
        Ok(thread.remove_follower(user_id))
    }

    async fn adjust_replies_count(&self, thread_id: Uuid, delta: i32) -> Result<u32> {
        let mut thread = self.threads.get_mut(&thread_id).ok_or_else(|| Self::missing(thread_id))?;
        thread.replies_count = thread.replies_count.saturating_add_signed(delta);
        Ok(thread.replies_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn missing_field_behaves_as_zero() {
        let store = MemoryEngagementStore::new();
        assert_eq!(store.decrement("reply:20240101", "topic:x", 1).await.unwrap(), -1);
        assert_eq!(store.increment("view:20240101", "topic:x", 1).await.unwrap(), 1);
        assert_eq!(store.increment("view:20240101", "topic:x", 1).await.unwrap(), 2);
        assert!(store.read_all("view:19990101").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = std::sync::Arc::new(MemoryEngagementStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    store.increment("view:20240101", "topic:a", 1).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.value("view:20240101", "topic:a"), 800);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryEngagementStore::new();
        store.set_available(false);
        assert_err!(store.increment("view:20240101", "topic:a", 1).await);
        store.set_available(true);
        assert_ok!(store.increment("view:20240101", "topic:a", 1).await);
    }

    #[tokio::test]
    async fn ranking_is_replaced_and_paged() {
        let store = MemoryEngagementStore::new();
        let a = RankedThread { thread_id: Uuid::from_u128(1), score: 10 };
        let b = RankedThread { thread_id: Uuid::from_u128(2), score: 30 };
        let c = RankedThread { thread_id: Uuid::from_u128(3), score: 20 };
        store.replace_ranking("hot:weekly", &[a, b, c]).await.unwrap();

        assert_eq!(store.read_ranking("hot:weekly", 0, 2).await.unwrap(), vec![b, c]);
        assert_eq!(store.read_ranking("hot:weekly", 2, 10).await.unwrap(), vec![a]);

        store.replace_ranking("hot:weekly", &[a]).await.unwrap();
        assert_eq!(store.read_ranking("hot:weekly", 0, 10).await.unwrap(), vec![a]);

        store.replace_ranking("hot:weekly", &[]).await.unwrap();
        assert!(store.read_ranking("hot:weekly", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_leaves_followers_and_count_alone() {
        let repo = MemoryThreadRepo::new();
        let thread = Thread::new(Uuid::now_v7(), Uuid::now_v7(), Utc::now());
        repo.insert_thread(thread.clone());

        let follower = Uuid::now_v7();
        assert!(repo.add_follower(thread.id, follower).await.unwrap());
        assert_eq!(repo.adjust_replies_count(thread.id, 1).await.unwrap(), 1);

        // A stale copy saved afterwards must not wipe either field.
        repo.save(&thread).await.unwrap();
        let stored = repo.get(thread.id).unwrap();
        assert!(stored.follower_ids.contains(&follower));
        assert_eq!(stored.replies_count, 1);
    }

    #[tokio::test]
    async fn replies_count_never_goes_negative() {
        let repo = MemoryThreadRepo::new();
        let thread = Thread::new(Uuid::now_v7(), Uuid::now_v7(), Utc::now());
        repo.insert_thread(thread.clone());
        assert_eq!(repo.adjust_replies_count(thread.id, -1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_replies_skip_excluded() {
        let repo = MemoryThreadRepo::new();
        let thread = Thread::new(Uuid::now_v7(), Uuid::now_v7(), Utc::now());
        let base = Utc::now();
        let replies: Vec<Reply> = (0..3)
            .map(|i| Reply {
                id: Uuid::now_v7(),
                thread_id: thread.id,
                author_id: Uuid::now_v7(),
                author_login: format!("user{i}"),
                created_at: base + Duration::minutes(i),
            })
            .collect();
        for r in &replies {
            repo.insert_reply(r.clone());
        }

        let found = repo
            .recent_replies_excluding(thread.id, &[replies[2].id], 1)
            .await
            .unwrap();
        assert_eq!(found, vec![replies[1].clone()]);
    }
}
