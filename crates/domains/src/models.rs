//! # Domain Models
//!
//! Threads and replies as seen by the engagement core. Content, rendering and
//! moderation fields live with the external persistence layer; only what the
//! last-reply pointer, follower set and ordering mark need is modelled here.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::collections::BTreeSet;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Result};

/// How long after creation a thread still re-surfaces in recency-sorted views
/// when it receives a reply.
pub const ACTIVE_HORIZON: Months = Months::new(1);

/// A reply, reduced to what the pointer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    /// Display name of the author at the time of replying
    pub author_login: String,
    pub created_at: DateTime<Utc>,
}

/// The denormalized pointer to a thread's most recent reply.
///
/// Grouping the fields in one struct held as `Option<LastReply>` makes the
/// "all null or all set" rule structural: there is no way to set the reply id
/// without the author and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastReply {
    pub reply_id: Uuid,
    pub user_id: Uuid,
    /// Cached display name, avoids a user lookup on thread listings
    pub user_login: Option<String>,
    pub replied_at: DateTime<Utc>,
}

impl LastReply {
    pub fn from_reply(reply: &Reply) -> Self {
        Self {
            reply_id: reply.id,
            user_id: reply.author_id,
            user_login: Some(reply.author_login.clone()),
            replied_at: reply.created_at,
        }
    }

    /// Rebuilds the pointer from nullable storage columns.
    ///
    /// The login is a cache and may be missing on its own; the other three
    /// columns must be all null or all present.
    pub fn from_columns(
        reply_id: Option<Uuid>,
        user_id: Option<Uuid>,
        user_login: Option<String>,
        replied_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>> {
        match (reply_id, user_id, replied_at) {
            (Some(reply_id), Some(user_id), Some(replied_at)) => Ok(Some(Self {
                reply_id,
                user_id,
                user_login,
                replied_at,
            })),
            (None, None, None) => Ok(None),
            (reply_id, user_id, replied_at) => Err(DomainError::InvalidState(format!(
                "last reply pointer partially set (reply_id: {}, user_id: {}, replied_at: {})",
                reply_id.is_some(),
                user_id.is_some(),
                replied_at.is_some()
            ))),
        }
    }
}

/// A discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Only ever moved through `ThreadRepo::adjust_replies_count`
    pub replies_count: u32,
    pub last_reply: Option<LastReply>,
    /// Epoch seconds, used purely for ordering
    pub last_active_mark: i64,
    /// Users interested in the thread, never including the author
    pub follower_ids: BTreeSet<Uuid>,
}

impl Thread {
    /// A fresh thread. The activity mark starts at the creation time.
    pub fn new(id: Uuid, author_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            author_id,
            created_at,
            replies_count: 0,
            last_reply: None,
            last_active_mark: created_at.timestamp(),
            follower_ids: BTreeSet::new(),
        }
    }

    pub fn last_reply_id(&self) -> Option<Uuid> {
        self.last_reply.as_ref().map(|p| p.reply_id)
    }

    pub fn last_reply_user_id(&self) -> Option<Uuid> {
        self.last_reply.as_ref().map(|p| p.user_id)
    }

    pub fn last_reply_user_login(&self) -> Option<&str> {
        self.last_reply.as_ref().and_then(|p| p.user_login.as_deref())
    }

    pub fn replied_at(&self) -> Option<DateTime<Utc>> {
        self.last_reply.as_ref().map(|p| p.replied_at)
    }

    /// Whether a reply at `now` should still bump the thread in recency order.
    pub fn is_still_active(&self, now: DateTime<Utc>) -> bool {
        now.checked_sub_months(ACTIVE_HORIZON)
            .is_some_and(|horizon| self.created_at > horizon)
    }

    /// Moves the last-reply pointer.
    ///
    /// `None` without `force` is refused and returns false. With `force`,
    /// `None` clears the pointer. The activity mark is bumped to `now` only
    /// while the thread is inside the activity horizon, and never moves back.
    pub fn point_to(&mut self, reply: Option<&Reply>, now: DateTime<Utc>, force: bool) -> bool {
        if reply.is_none() && !force {
            return false;
        }

        if self.is_still_active(now) {
            self.last_active_mark = self.last_active_mark.max(now.timestamp());
        }
        self.last_reply = reply.map(LastReply::from_reply);
        true
    }

    /// True when `reply` was written by the user the pointer currently names.
    ///
    /// Matching is by author: deleting an older reply by a different user
    /// can never move the pointer.
    pub fn is_pointer_author(&self, reply: &Reply) -> bool {
        self.last_reply_user_id() == Some(reply.author_id)
    }

    /// Adds a follower. The author and existing followers are ignored.
    pub fn insert_follower(&mut self, user_id: Uuid) -> bool {
        if user_id == self.author_id {
            return false;
        }
        self.follower_ids.insert(user_id)
    }

    pub fn remove_follower(&mut self, user_id: Uuid) -> bool {
        if user_id == self.author_id {
            return false;
        }
        self.follower_ids.remove(&user_id)
    }

    /// Last page of the reply listing, `None` when a single page holds everything.
    pub fn last_page(&self, per_page: u32) -> Option<u32> {
        if per_page == 0 {
            return None;
        }
        let page = self.replies_count.div_ceil(per_page);
        (page > 1).then_some(page)
    }
}
