//! thread-pulse/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the `domains` ports. The in-memory adapters are always
//! compiled; backends are selected with features.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::{MemoryEngagementStore, MemoryThreadRepo};

#[cfg(feature = "redis")]
pub use redis::RedisEngagementStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgThreadRepo;
