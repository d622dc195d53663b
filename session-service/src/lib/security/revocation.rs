use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

/// In-memory registry of access tokens invalidated before their natural expiry.
///
/// Keyed by token fingerprint, never by the raw token. An entry counts as
/// revoked up to and including its expiry instant and is ignored afterwards,
/// whether or not a sweep has run.
#[derive(Debug, Default)]
pub struct RevocationCache {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `token_id` until `expires_at`.
    ///
    /// Re-adding an entry never shortens it.
    pub async fn add(&self, token_id: String, expires_at: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries
            .entry(token_id)
            .and_modify(|current| {
                if expires_at > *current {
                    *current = expires_at;
                }
            })
            .or_insert(expires_at);
    }

    pub async fn is_revoked(&self, token_id: &str) -> bool {
        self.is_revoked_at(token_id, Utc::now()).await
    }

    /// Lookup against an explicit clock; stale entries are dropped on the way.
    pub async fn is_revoked_at(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        {
            let entries = self.entries.read().await;
            match entries.get(token_id) {
                None => return false,
                Some(expires_at) if now <= *expires_at => return true,
                Some(_) => {}
            }
        }

        // Re-check under the write lock: the entry may have been extended.
        let mut entries = self.entries.write().await;
        match entries.get(token_id) {
            Some(expires_at) if now <= *expires_at => true,
            Some(_) => {
                entries.remove(token_id);
                false
            }
            None => false,
        }
    }

    /// Purge all entries past expiry.
    ///
    /// # Returns
    /// Number of purged entries
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| now <= *expires_at);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
