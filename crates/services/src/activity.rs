//! # ThreadActivity
//!
//! Entry point for collaborators (web handlers, reply persistence, the
//! scheduler). Addresses threads by id and composes the recorder, the
//! last-reply tracker, the follower service and the aggregator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    Clock, CounterStore, DomainError, RankedThread, RankingStore, RankingWindow, Reply, Result,
    Thread, ThreadRepo,
};
use tracing::info;
use uuid::Uuid;

use crate::engagement::EngagementRecorder;
use crate::followers::FollowerService;
use crate::hot_score::HotScoreAggregator;
use crate::last_reply::{LastReplyTracker, PointerUpdate};

#[derive(Clone)]
pub struct ThreadActivity {
    threads: Arc<dyn ThreadRepo>,
    recorder: EngagementRecorder,
    last_reply: LastReplyTracker,
    followers: FollowerService,
    aggregator: Arc<HotScoreAggregator>,
}

impl ThreadActivity {
    /// Store handles are created once at startup and shared by every component.
    pub fn new(
        threads: Arc<dyn ThreadRepo>,
        counters: Arc<dyn CounterStore>,
        rankings: Arc<dyn RankingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            recorder: EngagementRecorder::new(counters.clone(), clock.clone()),
            last_reply: LastReplyTracker::new(threads.clone(), clock.clone()),
            followers: FollowerService::new(threads.clone()),
            aggregator: Arc::new(HotScoreAggregator::new(counters, rankings, clock)),
            threads,
        }
    }

    pub fn recorder(&self) -> &EngagementRecorder {
        &self.recorder
    }

    pub fn aggregator(&self) -> Arc<HotScoreAggregator> {
        self.aggregator.clone()
    }

    pub async fn record_view(&self, thread_id: Uuid) {
        self.recorder.record_view(thread_id).await
    }

    pub async fn record_reply(&self, thread_id: Uuid) {
        self.recorder.record_reply(thread_id).await
    }

    pub async fn record_reply_deleted(&self, thread_id: Uuid, original_created_at: DateTime<Utc>) {
        self.recorder
            .record_reply_deleted(thread_id, original_created_at)
            .await
    }

    /// Points the thread at the new reply, makes the replier a follower, and
    /// counts it.
    ///
    /// The count moves last: a retry after an error must not count the reply
    /// twice, while the pointer and follower steps repeat harmlessly.
    pub async fn on_reply_created(&self, thread_id: Uuid, reply: &Reply) -> Result<PointerUpdate> {
        let mut thread = self.load(thread_id).await?;
        let update = self.last_reply.on_reply_created(&mut thread, reply).await?;
        if update == PointerUpdate::NotApplicable {
            return Ok(update);
        }
        self.followers.add_follower(&thread, reply.author_id).await?;
        self.threads.adjust_replies_count(thread_id, 1).await?;
        Ok(update)
    }

    /// Repairs the pointer if it named the deleted reply, then uncounts it.
    pub async fn on_reply_deleted(&self, thread_id: Uuid, deleted: &Reply) -> Result<PointerUpdate> {
        if deleted.thread_id != thread_id {
            return Ok(PointerUpdate::NotApplicable);
        }
        let mut thread = self.load(thread_id).await?;
        let update = self.last_reply.on_reply_deleted(&mut thread, deleted).await?;
        self.threads.adjust_replies_count(thread_id, -1).await?;
        Ok(update)
    }

    pub async fn force_clear(&self, thread_id: Uuid) -> Result<PointerUpdate> {
        let mut thread = self.load(thread_id).await?;
        self.last_reply.force_clear(&mut thread).await
    }

    pub async fn add_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let thread = self.load(thread_id).await?;
        self.followers.add_follower(&thread, user_id).await
    }

    pub async fn remove_follower(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        let thread = self.load(thread_id).await?;
        self.followers.remove_follower(&thread, user_id).await
    }

    /// `window_name` is `daily`, `weekly`, or the full `hot:` key.
    pub async fn get_ranking(
        &self,
        window_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RankedThread>> {
        let window: RankingWindow = window_name.parse()?;
        self.aggregator.ranking(window, offset, limit).await
    }

    /// Drops a destroyed thread's counters so it leaves the rankings on the
    /// next run.
    pub async fn on_thread_destroyed(&self, thread_id: Uuid) -> Result<()> {
        self.recorder.purge_thread(thread_id).await?;
        info!(%thread_id, "thread engagement purged");
        Ok(())
    }

    async fn load(&self, thread_id: Uuid) -> Result<Thread> {
        self.threads
            .load(thread_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Thread".to_string(), thread_id.to_string()))
    }
}
