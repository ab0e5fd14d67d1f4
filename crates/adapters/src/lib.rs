//! feed-herald adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `feed`: HTTP feed source (reqwest + feed-rs)
//! - `forum`: Lemmy forum client
//! - `state`: SQLite and in-memory state stores

mod feed_http;
mod lemmy;
mod state_memory;
mod state_sqlite;

/// Re-exports for feed source adapters
pub mod feed {
    pub use crate::feed_http::HttpFeedSource;
}

/// Re-exports for forum client adapters
pub mod forum {
    pub use crate::lemmy::{LemmyClient, LemmyConfig};
}

/// Re-exports for state adapters
pub mod state {
    pub use crate::state_memory::InMemoryStore;
    pub use crate::state_sqlite::SqliteStore;
}
