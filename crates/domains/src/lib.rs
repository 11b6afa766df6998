//! thread-pulse/crates/domains/src/lib.rs
//!
//! Domain models, bucket layout and port definitions for the thread
//! engagement core. No I/O lives here.

pub mod clock;
pub mod engagement;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use engagement::*;
pub use error::*;
pub use models::*;
pub use traits::*;
