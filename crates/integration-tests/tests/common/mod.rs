//! Shared fixtures: one in-memory world per test.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use domains::{FixedClock, Reply, Thread};
use services::ThreadActivity;
use storage_adapters::{MemoryEngagementStore, MemoryThreadRepo};
use uuid::Uuid;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

pub struct World {
    pub clock: Arc<FixedClock>,
    pub counters: Arc<MemoryEngagementStore>,
    pub threads: Arc<MemoryThreadRepo>,
    pub activity: ThreadActivity,
}

impl World {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(start()));
        let counters = Arc::new(MemoryEngagementStore::new());
        let threads = Arc::new(MemoryThreadRepo::new());
        let activity = ThreadActivity::new(
            threads.clone(),
            counters.clone(),
            counters.clone(),
            clock.clone(),
        );
        Self { clock, counters, threads, activity }
    }

    /// A thread created at the current clock time.
    pub fn thread(&self) -> Thread {
        self.thread_created_at(self.clock_now())
    }

    pub fn thread_created_at(&self, created_at: DateTime<Utc>) -> Thread {
        let thread = Thread::new(Uuid::now_v7(), Uuid::now_v7(), created_at);
        self.threads.insert_thread(thread.clone());
        thread
    }

    /// Stores a reply by `author` at the current clock time and runs the
    /// creation hook, as the reply persistence layer would.
    pub async fn reply(&self, thread: &Thread, author: Uuid) -> Reply {
        let reply = Reply {
            id: Uuid::now_v7(),
            thread_id: thread.id,
            author_id: author,
            author_login: format!("user-{}", &author.to_string()[..8]),
            created_at: self.clock_now(),
        };
        self.threads.insert_reply(reply.clone());
        self.activity
            .on_reply_created(thread.id, &reply)
            .await
            .expect("reply hook");
        reply
    }

    /// Removes the reply and runs the deletion hook.
    pub async fn delete(&self, reply: &Reply) -> services::PointerUpdate {
        self.threads.remove_reply(reply.thread_id, reply.id);
        self.activity
            .on_reply_deleted(reply.thread_id, reply)
            .await
            .expect("delete hook")
    }

    pub fn stored(&self, thread: &Thread) -> Thread {
        self.threads.get(thread.id).expect("thread exists")
    }

    pub fn tick(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use domains::Clock;
        self.clock.now()
    }
}
