//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the services.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::engagement::RankedThread;
use crate::error::Result;
use crate::models::{Reply, Thread};

/// Atomic per-field counters grouped in named hashes (buckets).
///
/// Implementations must apply each increment atomically on the store side;
/// callers never read-modify-write.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds `delta` to `field` of `bucket` and returns the new value.
    /// A missing bucket or field counts as zero.
    async fn increment(&self, bucket: &str, field: &str, delta: i64) -> Result<i64>;

    /// Subtracts `delta`. Values may go negative.
    async fn decrement(&self, bucket: &str, field: &str, delta: i64) -> Result<i64>;

    /// Every field of `bucket`. A missing bucket is an empty map.
    async fn read_all(&self, bucket: &str) -> Result<HashMap<String, i64>>;

    /// Drops `field` from `bucket`. Missing fields are not an error.
    async fn remove(&self, bucket: &str, field: &str) -> Result<()>;
}

/// Ordered `(thread, score)` sets, one per ranking window key.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Replaces the whole set under `key` in one step. An empty slice deletes it.
    async fn replace_ranking(&self, key: &str, entries: &[RankedThread]) -> Result<()>;

    /// Highest score first.
    async fn read_ranking(&self, key: &str, offset: usize, limit: usize)
        -> Result<Vec<RankedThread>>;
}

/// Thread persistence contract.
///
/// `save` writes the pointer fields and the activity mark only. The follower
/// set and the reply count change exclusively through their own atomic
/// primitives so a concurrent save cannot overwrite them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn load(&self, thread_id: Uuid) -> Result<Option<Thread>>;

    async fn save(&self, thread: &Thread) -> Result<()>;

    /// Replies of the thread not listed in `excluded`, most recent first.
    async fn recent_replies_excluding(
        &self,
        thread_id: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<Reply>>;

    /// Set-union of one follower. Returns false when already present.
    async fn add_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Set-remove of one follower. Returns false when absent.
    async fn remove_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Atomically moves the reply count by `delta`, never below zero.
    async fn adjust_replies_count(&self, thread_id: Uuid, delta: i32) -> Result<u32>;
}
