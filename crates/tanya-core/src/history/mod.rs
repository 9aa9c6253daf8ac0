//! Bucketed chat history.
//!
//! [`HistoryStore`] owns the per-user history cache: entries grouped by
//! recency bucket, replaced atomically on each successful fetch and cleared
//! whenever the user signs out. It never merges partial results.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::backend::ChatBackend;
use crate::error::Result;

/// Recency category used to group history entries for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    Today,
    Yesterday,
    Last7Days,
    Older,
}

impl Bucket {
    /// Display label for the sidebar group header.
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Today => "Hari ini",
            Bucket::Yesterday => "Kemarin",
            Bucket::Last7Days => "7 hari terakhir",
            Bucket::Older => "Lebih lama",
        }
    }
}

/// A single persisted conversation as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Backend identifier of the persisted session.
    pub id: String,
    /// Short title derived from the conversation.
    pub title: String,
    /// Number of messages in the session, when the backend reports it.
    pub message_count: Option<u32>,
    /// The recency bucket this entry belongs to.
    pub bucket: Bucket,
}

/// The full bucketed history for one user.
///
/// Replaced atomically on each successful fetch; buckets are never updated
/// independently of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryBuckets {
    #[serde(default)]
    pub today: Vec<HistoryEntry>,
    #[serde(default)]
    pub yesterday: Vec<HistoryEntry>,
    #[serde(default)]
    pub last7days: Vec<HistoryEntry>,
    #[serde(default)]
    pub older: Vec<HistoryEntry>,
}

impl HistoryBuckets {
    /// Total number of entries across all buckets.
    pub fn total(&self) -> usize {
        self.today.len() + self.yesterday.len() + self.last7days.len() + self.older.len()
    }

    /// True when no bucket holds any entry.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-empty buckets in display order. An all-empty history yields zero
    /// groups; the empty-state presentation is the UI's concern.
    pub fn groups(&self) -> Vec<(Bucket, &[HistoryEntry])> {
        [
            (Bucket::Today, self.today.as_slice()),
            (Bucket::Yesterday, self.yesterday.as_slice()),
            (Bucket::Last7Days, self.last7days.as_slice()),
            (Bucket::Older, self.older.as_slice()),
        ]
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
        .collect()
    }
}

/// Owns the bucketed history cache for the current user.
pub struct HistoryStore {
    backend: Arc<dyn ChatBackend>,
    buckets: RwLock<HistoryBuckets>,
    loading: AtomicBool,
    /// Bumped on every clear; a fetch that started under an older epoch is
    /// discarded instead of resurrecting a signed-out user's history.
    epoch: AtomicU64,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            buckets: RwLock::new(HistoryBuckets::default()),
            loading: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    /// Fetches the user's history and replaces the cache atomically.
    ///
    /// On failure the prior buckets are left untouched and the error is
    /// returned; callers decide whether to surface it (background refreshes
    /// log and move on).
    pub async fn refresh(&self, user_id: &str) -> Result<()> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.loading.store(true, Ordering::SeqCst);
        tracing::debug!(user_id, "loading chat history");

        let fetched = self.backend.history(user_id).await;
        self.loading.store(false, Ordering::SeqCst);

        match fetched {
            Ok(buckets) => {
                let mut guard = self.buckets.write().await;
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    tracing::debug!(user_id, "history cleared mid-fetch, discarding result");
                    return Ok(());
                }
                tracing::debug!(
                    user_id,
                    today = buckets.today.len(),
                    yesterday = buckets.yesterday.len(),
                    last7days = buckets.last7days.len(),
                    older = buckets.older.len(),
                    total = buckets.total(),
                    "chat history loaded"
                );
                *guard = buckets;
                Ok(())
            }
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to load chat history");
                Err(err)
            }
        }
    }

    /// Empties the cache. Invoked whenever the user id becomes absent.
    pub async fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.buckets.write().await = HistoryBuckets::default();
    }

    /// A cloned snapshot of the current buckets for display.
    pub async fn snapshot(&self) -> HistoryBuckets {
        self.buckets.read().await.clone()
    }

    /// True while a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}
