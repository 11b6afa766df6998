//! Maintenance of the denormalized last-reply pointer.
//!
//! The pointer is authoritative thread state: persistence failures are
//! returned to the caller, who retries or surfaces them.

use std::sync::Arc;

use domains::{Clock, Reply, Result, Thread, ThreadRepo};
use tracing::{debug, warn};

/// Whether an event moved the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerUpdate {
    Applied,
    NotApplicable,
}

#[derive(Clone)]
pub struct LastReplyTracker {
    threads: Arc<dyn ThreadRepo>,
    clock: Arc<dyn Clock>,
}

impl LastReplyTracker {
    pub fn new(threads: Arc<dyn ThreadRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { threads, clock }
    }

    /// Points the thread at `reply` and persists it. Replies belonging to
    /// another thread are ignored.
    pub async fn on_reply_created(&self, thread: &mut Thread, reply: &Reply) -> Result<PointerUpdate> {
        if reply.thread_id != thread.id {
            debug!(thread_id = %thread.id, reply_id = %reply.id, "reply belongs to another thread");
            return Ok(PointerUpdate::NotApplicable);
        }
        self.update(thread, Some(reply), false).await
    }

    /// Moves the pointer back to the previous reply when the deleted reply's
    /// author is the one currently pointed to, or empties it when no reply
    /// remains. Otherwise nothing changes.
    pub async fn on_reply_deleted(&self, thread: &mut Thread, deleted: &Reply) -> Result<PointerUpdate> {
        if deleted.thread_id != thread.id || !thread.is_pointer_author(deleted) {
            debug!(thread_id = %thread.id, reply_id = %deleted.id, "deleted reply is not the last reply");
            return Ok(PointerUpdate::NotApplicable);
        }

        let previous = self
            .threads
            .recent_replies_excluding(thread.id, &[deleted.id], 1)
            .await?
            .into_iter()
            .next();

        self.update(thread, previous.as_ref(), true).await
    }

    /// Blanks the pointer without a replacement reply.
    pub async fn force_clear(&self, thread: &mut Thread) -> Result<PointerUpdate> {
        self.update(thread, None, true).await
    }

    async fn update(&self, thread: &mut Thread, reply: Option<&Reply>, force: bool) -> Result<PointerUpdate> {
        let before = thread.clone();
        if !thread.point_to(reply, self.clock.now(), force) {
            return Ok(PointerUpdate::NotApplicable);
        }

        if let Err(e) = self.threads.save(thread).await {
            warn!(thread_id = %thread.id, error = %e, "failed to persist last reply pointer");
            // Keep the caller's copy in step with what is stored.
            *thread = before;
            return Err(e);
        }

        debug!(
            thread_id = %thread.id,
            last_reply_id = ?thread.last_reply_id(),
            "last reply pointer updated"
        );
        Ok(PointerUpdate::Applied)
    }
}
