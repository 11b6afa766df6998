//! Engagement recording.
//!
//! Translates view and reply events into bucket increments. Counters are
//! advisory: a failed update is logged and dropped, never returned to the
//! action that triggered it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{thread_field, BucketKey, Clock, CounterStore, EventKind, RankingWindow};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct EngagementRecorder {
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl EngagementRecorder {
    pub fn new(counters: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }

    pub async fn record_view(&self, thread_id: Uuid) {
        self.record_view_at(thread_id, self.clock.now()).await
    }

    /// One view in the day bucket and one in the hour bucket containing `at`.
    pub async fn record_view_at(&self, thread_id: Uuid, at: DateTime<Utc>) {
        let changes = [
            (BucketKey::day(EventKind::View, at), 1),
            (BucketKey::hour(EventKind::View, at), 1),
        ];
        self.apply(thread_id, &changes, "view").await;
    }

    pub async fn record_reply(&self, thread_id: Uuid) {
        self.record_reply_at(thread_id, self.clock.now()).await
    }

    /// Replies are tracked per day only; the hour slot goes to the view
    /// bucket since replying implies a page view.
    pub async fn record_reply_at(&self, thread_id: Uuid, at: DateTime<Utc>) {
        let changes = [
            (BucketKey::day(EventKind::Reply, at), 1),
            (BucketKey::hour(EventKind::View, at), 1),
        ];
        self.apply(thread_id, &changes, "reply").await;
    }

    /// Takes back a reply from the buckets of its original creation time,
    /// so the decrement nets against the increment however late it comes.
    pub async fn record_reply_deleted(&self, thread_id: Uuid, replied_at: DateTime<Utc>) {
        let changes = [
            (BucketKey::day(EventKind::Reply, replied_at), -1),
            (BucketKey::hour(EventKind::Reply, replied_at), -1),
        ];
        self.apply(thread_id, &changes, "reply deleted").await;
    }

    /// Removes the thread from every bucket the ranking windows can still
    /// read, so it disappears from the next aggregation run.
    pub async fn purge_thread(&self, thread_id: Uuid) -> domains::Result<()> {
        let now = self.clock.now();
        let field = thread_field(thread_id);
        for window in RankingWindow::ALL {
            for (bucket, _) in window.buckets(now) {
                self.counters.remove(&bucket.to_string(), &field).await?;
            }
        }
        debug!(%thread_id, "purged engagement counters");
        Ok(())
    }

    async fn apply(&self, thread_id: Uuid, changes: &[(BucketKey, i64)], event: &str) {
        let field = thread_field(thread_id);
        for (bucket, delta) in changes {
            let bucket = bucket.to_string();
            let result = if *delta >= 0 {
                self.counters.increment(&bucket, &field, *delta).await
            } else {
                self.counters.decrement(&bucket, &field, -delta).await
            };
            match result {
                Ok(value) => debug!(%thread_id, %bucket, value, "{event} counted"),
                Err(e) => warn!(%thread_id, %bucket, error = %e, "dropping {event} counter update"),
            }
        }
    }
}
