use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use reclaim_client::ApiClient;

/// Process-shared advisory count of unread messages across all items.
///
/// Only ever set from a server re-fetch; there is no client-side decrement,
/// so it can be stale between refreshes but never goes below zero.
#[derive(Clone, Default)]
pub struct UnreadCounter {
    count: Arc<AtomicU64>,
}

impl UnreadCounter {
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Re-fetch from the server. On failure the previous value stands.
    pub async fn refresh(&self, api: &ApiClient) {
        match api.global_unread_count().await {
            Ok(count) => self.count.store(count, Ordering::Relaxed),
            Err(err) => warn!("global unread refresh failed: {}", err),
        }
    }
}
