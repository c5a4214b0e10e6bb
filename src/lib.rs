// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod feed;
pub mod format;
pub mod interact;
pub mod metrics;
pub mod push;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::interact::DirectReplier;
pub use crate::push::{PushEngine, PushSnapshot};

use std::sync::Arc;

use crate::interact::RECENT_REPLY_TTL;
use crate::push::cache::RecentIds;

/// Recent-reply cache shared by the push engine and the link replier.
pub fn shared_recent_ids() -> Arc<RecentIds> {
    Arc::new(RecentIds::new(RECENT_REPLY_TTL))
}
