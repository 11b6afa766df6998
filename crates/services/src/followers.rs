//! Follower set management.
//!
//! The author guard is checked here; set membership is decided by the
//! repository's set-union/set-remove primitives so concurrent followers
//! never overwrite each other.

use std::sync::Arc;

use domains::{Result, Thread, ThreadRepo};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct FollowerService {
    threads: Arc<dyn ThreadRepo>,
}

impl FollowerService {
    pub fn new(threads: Arc<dyn ThreadRepo>) -> Self {
        Self { threads }
    }

    /// True only when `user_id` was newly added.
    pub async fn add_follower(&self, thread: &Thread, user_id: Uuid) -> Result<bool> {
        if user_id == thread.author_id {
            return Ok(false);
        }
        let added = self.threads.add_follower(thread.id, user_id).await?;
        debug!(thread_id = %thread.id, %user_id, added, "follow");
        Ok(added)
    }

    /// True only when `user_id` was present and got removed.
    pub async fn remove_follower(&self, thread: &Thread, user_id: Uuid) -> Result<bool> {
        if user_id == thread.author_id {
            return Ok(false);
        }
        let removed = self.threads.remove_follower(thread.id, user_id).await?;
        debug!(thread_id = %thread.id, %user_id, removed, "unfollow");
        Ok(removed)
    }
}
