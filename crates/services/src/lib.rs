//! thread-pulse/crates/services/src/lib.rs
//!
//! Business logic of the engagement core. Depends only on the ports in
//! `domains`; adapters are injected at construction.

pub mod activity;
pub mod engagement;
pub mod followers;
pub mod hot_score;
pub mod last_reply;

pub use activity::ThreadActivity;
pub use engagement::EngagementRecorder;
pub use followers::FollowerService;
pub use hot_score::{HotScoreAggregator, RunOutcome};
pub use last_reply::{LastReplyTracker, PointerUpdate};
